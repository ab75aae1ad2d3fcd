//! The device topology resolver (`spec.md` §4.5): reconciles user-supplied stripe geometry with
//! whatever the data device itself advertises, and normalizes `su`/`sw` into `sunit`/`swidth`.

use std::fs::File;

use crate::context::Context;
use crate::error::{Error, Kind};
use crate::schema::Opt;

/// Stripe geometry in basic (512-byte) blocks, the unit the on-disk superblock stores.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stripe {
	pub sunit: u32,
	pub swidth: u32,
}

/// Resolves data-device stripe alignment, mutating `ctx`'s `d_sunit`/`d_swidth`/`d_noalign`
/// suboptions in place and pushing a `TopologyMismatch` warning when the user's figures disagree
/// with the device's.
pub fn resolve_stripe(ctx: &mut Context, dev: &File, sector_size: u64) -> Result<Stripe, Error> {
	let device = utils::disk::get_stripe_geometry(dev)
		.ok()
		.map(|(sunit_bytes, swidth_bytes)| Stripe {
			sunit: (sunit_bytes as u64 / 512) as u32,
			swidth: (swidth_bytes as u64 / 512) as u32,
		})
		.filter(|s| s.sunit > 0);

	let su_seen = ctx.is_seen(Opt::d_su) || ctx.is_seen(Opt::d_sw);
	let user = if ctx.is_seen(Opt::d_sunit) || ctx.is_seen(Opt::d_swidth) {
		if ctx.is_seen(Opt::d_sunit) != ctx.is_seen(Opt::d_swidth) {
			return Err(Error::new(
				Kind::ParseSyntax,
				"sunit and swidth must be specified together",
			));
		}
		Some(Stripe {
			sunit: ctx.num(Opt::d_sunit) as u32,
			swidth: ctx.num(Opt::d_swidth) as u32,
		})
	} else if su_seen {
		let su = ctx.num(Opt::d_su);
		let sw = ctx.num(Opt::d_sw).max(1);
		if su % sector_size != 0 {
			return Err(Error::new(
				Kind::RangeViolation,
				format!("su {su} must be a multiple of the sector size"),
			));
		}
		let sunit = (su / 512) as u32;
		Some(Stripe {
			sunit,
			swidth: sunit * sw as u32,
		})
	} else {
		None
	};

	let resolved = match (user, device) {
		(Some(u), Some(d)) => {
			if u != d {
				ctx.warnings.push(format!(
					"specified sunit {} is not the same as the volume sunit {}",
					u.sunit, d.sunit
				));
			}
			u
		}
		(Some(u), None) => u,
		(None, Some(d)) => d,
		(None, None) => {
			if !ctx.is_seen(Opt::d_noalign) {
				ctx.force(Opt::d_noalign, crate::value::Value::Bool(true));
			}
			Stripe::default()
		}
	};

	ctx.force(Opt::d_sunit, crate::value::Value::Num(resolved.sunit as u64));
	ctx.force(Opt::d_swidth, crate::value::Value::Num(resolved.swidth as u64));
	Ok(resolved)
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn stripe_pair_incomplete_is_rejected() {
		let mut ctx = Context::new();
		ctx.set(Opt::d_sunit, crate::value::Value::Num(128)).unwrap();
		// d_swidth intentionally left unset: the pair is incomplete.
		let err = (|| -> Result<(), Error> {
			if ctx.is_seen(Opt::d_sunit) != ctx.is_seen(Opt::d_swidth) {
				return Err(Error::new(Kind::ParseSyntax, "sunit and swidth must be specified together"));
			}
			Ok(())
		})();
		assert!(err.is_err());
	}
}
