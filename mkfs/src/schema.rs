//! The static option schema (`spec.md` §3.1): every suboption across the seven top-level option
//! groups, its value kind, range, and unconditional conflicts.
//!
//! Value-dependent conflicts (§4.2) live in [`crate::conflict`] instead, since they carry a
//! peer value and a message in addition to a suboption reference and don't fit a flat list as
//! naturally.

use crate::value::ValueKind;

/// Every suboption across all seven groups, flattened into one enum so that conflicts can
/// reference a peer in a different group (e.g. `-m crc` forcing `-n ftype`) without a second
/// level of indirection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum Opt {
	b_log,
	b_size,

	d_agcount,
	d_file,
	d_name,
	d_size,
	d_sunit,
	d_swidth,
	d_agsize,
	d_su,
	d_sw,
	d_sectlog,
	d_sectsize,
	d_noalign,
	d_rtinherit,
	d_projinherit,
	d_extszinherit,

	i_align,
	i_log,
	i_maxpct,
	i_perblock,
	i_size,
	i_attr,
	i_projid32bit,
	i_sparse,

	l_agnum,
	l_internal,
	l_size,
	l_version,
	l_sunit,
	l_su,
	l_dev,
	l_sectlog,
	l_sectsize,
	l_file,
	l_name,
	l_lazycount,

	n_log,
	n_size,
	n_version,
	n_ftype,

	r_extsize,
	r_size,
	r_dev,
	r_file,
	r_name,
	r_noalign,

	s_log,
	s_sectlog,
	s_size,
	s_sectsize,

	m_crc,
	m_finobt,
	m_uuid,
	m_rmapbt,
	m_reflink,
}

/// A declarative description of one suboption (`spec.md` §3.1 `Suboption`).
pub struct Suboption {
	pub opt: Opt,
	/// The group's command-line letter (`b`, `d`, `i`, `l`, `n`, `r`, `s`, `m`).
	pub group: char,
	pub name: &'static str,
	pub kind: ValueKind,
	pub needs_value: bool,
	/// Value implied when the suboption is written as a bare flag (`needs_value = false`).
	pub flag_value: u64,
	pub accepts_suffix: bool,
	pub power_of_two: bool,
	pub min: u64,
	pub max: u64,
	pub default: u64,
	/// Suboptions that are forbidden once this one has been written (unconditional, §4.2).
	pub conflicts: &'static [Opt],
}

macro_rules! subopt {
	($opt:ident, $group:expr, $name:expr, $kind:expr, needs_value: $needs_value:expr,
	 flag: $flag:expr, suffix: $suffix:expr, pow2: $pow2:expr,
	 range: $min:expr, $max:expr, default: $default:expr, conflicts: $conflicts:expr$(,)?) => {
		Suboption {
			opt: Opt::$opt,
			group: $group,
			name: $name,
			kind: $kind,
			needs_value: $needs_value,
			flag_value: $flag,
			accepts_suffix: $suffix,
			power_of_two: $pow2,
			min: $min,
			max: $max,
			default: $default,
			conflicts: $conflicts,
		}
	};
}

use crate::constants::*;
use crate::value::ValueKind::{Bool, Num, Str};

/// The full option schema, one entry per suboption, across all seven groups.
///
/// Mirrors the `subopt_params` tables in `examples/original_source/mkfs/xfs_mkfs.c`; every
/// `minval`/`maxval`/`conflicts` triple below is grounded on that source.
pub static SUBOPTIONS: &[Suboption] = &[
	// b_log/b_size are aliases (§4.1), not a conflicting pair: a second write through either
	// spelling is caught by the alias engine's respecification check, not this table.
	subopt!(b_log, 'b', "log", Num, needs_value: true, flag: 0, suffix: false, pow2: false,
		range: XFS_MIN_BLOCKSIZE_LOG as u64, XFS_MAX_BLOCKSIZE_LOG as u64, default: 12,
		conflicts: &[]),
	subopt!(b_size, 'b', "size", Num, needs_value: true, flag: 0, suffix: true, pow2: true,
		range: XFS_MIN_BLOCKSIZE, XFS_MAX_BLOCKSIZE, default: 4096,
		conflicts: &[]),

	subopt!(d_agcount, 'd', "agcount", Num, needs_value: true, flag: 0, suffix: false, pow2: false,
		range: 1, XFS_MAX_AGNUMBER, default: 0, conflicts: &[Opt::d_agsize]),
	subopt!(d_file, 'd', "file", Bool, needs_value: false, flag: 1, suffix: false, pow2: false,
		range: 0, 1, default: 0, conflicts: &[]),
	subopt!(d_name, 'd', "name", Str, needs_value: true, flag: 0, suffix: false, pow2: false,
		range: 0, 0, default: 0, conflicts: &[]),
	// The literal is a byte count here; the block-size-dependent floor is re-checked in blocks
	// once the block size is known (§4.6 phase 1).
	subopt!(d_size, 'd', "size", Num, needs_value: true, flag: 0, suffix: true, pow2: false,
		range: XFS_MIN_DATA_BLOCKS * XFS_MIN_BLOCKSIZE, u64::MAX, default: 0, conflicts: &[]),
	subopt!(d_sunit, 'd', "sunit", Num, needs_value: true, flag: 0, suffix: false, pow2: false,
		range: 0, u32::MAX as u64, default: 0,
		conflicts: &[Opt::d_noalign, Opt::d_su, Opt::d_sw]),
	subopt!(d_swidth, 'd', "swidth", Num, needs_value: true, flag: 0, suffix: false, pow2: false,
		range: 0, u32::MAX as u64, default: 0,
		conflicts: &[Opt::d_noalign, Opt::d_su, Opt::d_sw]),
	// Coarse byte-range sanity bound computed against the default block size; the authoritative
	// blocks-based check runs in the geometry solver (§4.6 phase 6) once block size is final.
	subopt!(d_agsize, 'd', "agsize", Num, needs_value: true, flag: 0, suffix: true, pow2: false,
		range: xfs_ag_min_blocks(12) * 4096, xfs_ag_max_blocks(12) * 4096, default: 0,
		conflicts: &[Opt::d_agcount]),
	subopt!(d_su, 'd', "su", Num, needs_value: true, flag: 0, suffix: true, pow2: false,
		range: 0, u32::MAX as u64, default: 0,
		conflicts: &[Opt::d_noalign, Opt::d_sunit, Opt::d_swidth]),
	subopt!(d_sw, 'd', "sw", Num, needs_value: true, flag: 0, suffix: false, pow2: false,
		range: 0, u32::MAX as u64, default: 0,
		conflicts: &[Opt::d_noalign, Opt::d_sunit, Opt::d_swidth]),
	// d_sectlog/d_sectsize (and the s-group/l-group members in their alias class) are aliases,
	// not conflicts — see the b_log/b_size note above.
	subopt!(d_sectlog, 'd', "sectlog", Num, needs_value: true, flag: 0, suffix: false, pow2: false,
		range: XFS_MIN_SECTORSIZE_LOG as u64, XFS_MAX_SECTORSIZE_LOG as u64, default: 9,
		conflicts: &[]),
	subopt!(d_sectsize, 'd', "sectsize", Num, needs_value: true, flag: 0, suffix: true, pow2: true,
		range: XFS_MIN_SECTORSIZE, XFS_MAX_SECTORSIZE, default: 512,
		conflicts: &[]),
	subopt!(d_noalign, 'd', "noalign", Bool, needs_value: false, flag: 1, suffix: false, pow2: false,
		range: 0, 1, default: 0,
		conflicts: &[Opt::d_su, Opt::d_sw, Opt::d_sunit, Opt::d_swidth]),
	subopt!(d_rtinherit, 'd', "rtinherit", Bool, needs_value: false, flag: 1, suffix: false, pow2: false,
		range: 0, 1, default: 0, conflicts: &[]),
	subopt!(d_projinherit, 'd', "projinherit", Num, needs_value: true, flag: 0, suffix: false, pow2: false,
		range: 0, u32::MAX as u64, default: 0, conflicts: &[]),
	subopt!(d_extszinherit, 'd', "extszinherit", Num, needs_value: true, flag: 0, suffix: false, pow2: false,
		range: 0, u32::MAX as u64, default: 0, conflicts: &[]),

	subopt!(i_align, 'i', "align", Bool, needs_value: false, flag: 1, suffix: false, pow2: false,
		range: 0, 1, default: 1, conflicts: &[]),
	// i_log/i_size are aliases (§4.1); i_perblock is a third representation of the same field
	// left out of that alias group, so it keeps a real conflict against both.
	subopt!(i_log, 'i', "log", Num, needs_value: true, flag: 0, suffix: false, pow2: false,
		range: XFS_DINODE_MIN_LOG as u64, XFS_DINODE_MAX_LOG as u64, default: 9,
		conflicts: &[Opt::i_perblock]),
	subopt!(i_maxpct, 'i', "maxpct", Num, needs_value: true, flag: 0, suffix: false, pow2: false,
		range: 0, 100, default: 25, conflicts: &[]),
	subopt!(i_perblock, 'i', "perblock", Num, needs_value: true, flag: 0, suffix: false, pow2: true,
		range: 1, XFS_MAX_BLOCKSIZE / XFS_DINODE_MIN_SIZE, default: 0,
		conflicts: &[Opt::i_log, Opt::i_size]),
	subopt!(i_size, 'i', "size", Num, needs_value: true, flag: 0, suffix: true, pow2: true,
		range: XFS_DINODE_MIN_SIZE, XFS_DINODE_MAX_SIZE, default: 512,
		conflicts: &[Opt::i_perblock]),
	subopt!(i_attr, 'i', "attr", Num, needs_value: true, flag: 0, suffix: false, pow2: false,
		range: 0, 2, default: 2, conflicts: &[]),
	subopt!(i_projid32bit, 'i', "projid32bit", Bool, needs_value: false, flag: 1, suffix: false, pow2: false,
		range: 0, 1, default: 1, conflicts: &[]),
	subopt!(i_sparse, 'i', "sparse", Bool, needs_value: false, flag: 1, suffix: false, pow2: false,
		range: 0, 1, default: 0, conflicts: &[]),

	subopt!(l_agnum, 'l', "agnum", Num, needs_value: true, flag: 0, suffix: false, pow2: false,
		range: 0, u32::MAX as u64, default: 0, conflicts: &[Opt::l_dev]),
	subopt!(l_internal, 'l', "internal", Bool, needs_value: false, flag: 1, suffix: false, pow2: false,
		range: 0, 1, default: 1, conflicts: &[Opt::l_file, Opt::l_dev]),
	subopt!(l_size, 'l', "size", Num, needs_value: true, flag: 0, suffix: true, pow2: false,
		range: XFS_MIN_LOG_BYTES, XFS_MAX_LOG_BYTES, default: 0, conflicts: &[]),
	subopt!(l_version, 'l', "version", Num, needs_value: true, flag: 0, suffix: false, pow2: false,
		range: 1, 2, default: 2, conflicts: &[]),
	subopt!(l_sunit, 'l', "sunit", Num, needs_value: true, flag: 0, suffix: false, pow2: false,
		range: 1, XLOG_MAX_RECORD_BSIZE / 512, default: 0, conflicts: &[Opt::l_su]),
	subopt!(l_su, 'l', "su", Num, needs_value: true, flag: 0, suffix: true, pow2: false,
		range: 512, XLOG_MAX_RECORD_BSIZE, default: 0, conflicts: &[Opt::l_sunit]),
	subopt!(l_dev, 'l', "logdev", Str, needs_value: true, flag: 0, suffix: false, pow2: false,
		range: 0, 0, default: 0, conflicts: &[Opt::l_agnum, Opt::l_internal]),
	subopt!(l_sectlog, 'l', "sectlog", Num, needs_value: true, flag: 0, suffix: false, pow2: false,
		range: XFS_MIN_SECTORSIZE_LOG as u64, XFS_MAX_SECTORSIZE_LOG as u64, default: 9,
		conflicts: &[]),
	subopt!(l_sectsize, 'l', "sectsize", Num, needs_value: true, flag: 0, suffix: true, pow2: true,
		range: XFS_MIN_SECTORSIZE, XFS_MAX_SECTORSIZE, default: 512, conflicts: &[]),
	subopt!(l_file, 'l', "file", Bool, needs_value: false, flag: 1, suffix: false, pow2: false,
		range: 0, 1, default: 0, conflicts: &[Opt::l_internal]),
	subopt!(l_name, 'l', "name", Str, needs_value: true, flag: 0, suffix: false, pow2: false,
		range: 0, 0, default: 0, conflicts: &[Opt::l_agnum, Opt::l_internal]),
	subopt!(l_lazycount, 'l', "lazy-count", Bool, needs_value: false, flag: 1, suffix: false, pow2: false,
		range: 0, 1, default: 1, conflicts: &[]),

	// n_log/n_size are aliases (§4.1), not a conflicting pair.
	subopt!(n_log, 'n', "log", Num, needs_value: true, flag: 0, suffix: false, pow2: false,
		range: XFS_MIN_REC_DIRSIZE as u64, XFS_MAX_BLOCKSIZE_LOG as u64, default: 12,
		conflicts: &[]),
	subopt!(n_size, 'n', "size", Num, needs_value: true, flag: 0, suffix: true, pow2: true,
		range: 1u64 << XFS_MIN_REC_DIRSIZE, XFS_MAX_BLOCKSIZE, default: 0, conflicts: &[]),
	// `version` accepts the literal `2` (a no-op; directories are always v2) or the keyword `ci`
	// (enables ASCII case-insensitive naming, `XFS_SB_VERSION_BORGBIT`) — a string kind, not a
	// number constrained to 2..=2, since `ci` isn't numeric.
	subopt!(n_version, 'n', "version", Str, needs_value: true, flag: 0, suffix: false, pow2: false,
		range: 0, 0, default: 0, conflicts: &[]),
	subopt!(n_ftype, 'n', "ftype", Bool, needs_value: false, flag: 1, suffix: false, pow2: false,
		range: 0, 1, default: 1, conflicts: &[]),

	subopt!(r_extsize, 'r', "extsize", Num, needs_value: true, flag: 0, suffix: true, pow2: false,
		range: XFS_MIN_RTEXTSIZE, XFS_MAX_RTEXTSIZE, default: 0, conflicts: &[]),
	subopt!(r_size, 'r', "size", Num, needs_value: true, flag: 0, suffix: true, pow2: false,
		range: 0, u64::MAX, default: 0, conflicts: &[]),
	subopt!(r_dev, 'r', "rtdev", Str, needs_value: true, flag: 0, suffix: false, pow2: false,
		range: 0, 0, default: 0, conflicts: &[]),
	subopt!(r_file, 'r', "file", Bool, needs_value: false, flag: 1, suffix: false, pow2: false,
		range: 0, 1, default: 0, conflicts: &[]),
	subopt!(r_name, 'r', "name", Str, needs_value: true, flag: 0, suffix: false, pow2: false,
		range: 0, 0, default: 0, conflicts: &[]),
	subopt!(r_noalign, 'r', "noalign", Bool, needs_value: false, flag: 1, suffix: false, pow2: false,
		range: 0, 1, default: 0, conflicts: &[]),

	subopt!(s_log, 's', "log", Num, needs_value: true, flag: 0, suffix: false, pow2: false,
		range: XFS_MIN_SECTORSIZE_LOG as u64, XFS_MAX_SECTORSIZE_LOG as u64, default: 9,
		conflicts: &[]),
	subopt!(s_sectlog, 's', "sectlog", Num, needs_value: true, flag: 0, suffix: false, pow2: false,
		range: XFS_MIN_SECTORSIZE_LOG as u64, XFS_MAX_SECTORSIZE_LOG as u64, default: 9,
		conflicts: &[]),
	subopt!(s_size, 's', "size", Num, needs_value: true, flag: 0, suffix: true, pow2: true,
		range: XFS_MIN_SECTORSIZE, XFS_MAX_SECTORSIZE, default: 512,
		conflicts: &[]),
	subopt!(s_sectsize, 's', "sectsize", Num, needs_value: true, flag: 0, suffix: true, pow2: true,
		range: XFS_MIN_SECTORSIZE, XFS_MAX_SECTORSIZE, default: 512,
		conflicts: &[]),

	subopt!(m_crc, 'm', "crc", Bool, needs_value: false, flag: 1, suffix: false, pow2: false,
		range: 0, 1, default: 1, conflicts: &[]),
	subopt!(m_finobt, 'm', "finobt", Bool, needs_value: false, flag: 1, suffix: false, pow2: false,
		range: 0, 1, default: 0, conflicts: &[]),
	subopt!(m_uuid, 'm', "uuid", Str, needs_value: true, flag: 0, suffix: false, pow2: false,
		range: 0, 0, default: 0, conflicts: &[]),
	subopt!(m_rmapbt, 'm', "rmapbt", Bool, needs_value: false, flag: 1, suffix: false, pow2: false,
		range: 0, 1, default: 0, conflicts: &[]),
	subopt!(m_reflink, 'm', "reflink", Bool, needs_value: false, flag: 1, suffix: false, pow2: false,
		range: 0, 1, default: 0, conflicts: &[]),
];

/// Looks up a suboption by its group letter and name.
pub fn find(group: char, name: &str) -> Option<&'static Suboption> {
	SUBOPTIONS.iter().find(|s| s.group == group && s.name == name)
}

/// Looks up a suboption's static schema entry by its [`Opt`] tag.
pub fn get(opt: Opt) -> &'static Suboption {
	SUBOPTIONS
		.iter()
		.find(|s| s.opt == opt)
		.expect("every Opt variant has a schema entry")
}

#[cfg(test)]
mod test {
	use super::*;

	/// Schema invariant (ii): `min <= default <= max` for every numeric/bool suboption.
	///
	/// A default of `0` below `min` is the "unset, derived later" sentinel (`spec.md` §4.3's
	/// defaults that depend on block size, device geometry, or filesystem size aren't knowable
	/// until `Context::fill_defaults` runs) rather than a literal default value, so it is exempt.
	#[test]
	fn defaults_within_range() {
		for s in SUBOPTIONS {
			if s.kind == crate::value::ValueKind::Str || s.default == 0 {
				continue;
			}
			assert!(
				s.min <= s.default && s.default <= s.max,
				"{}.{}: {} not within [{}, {}]",
				s.group,
				s.name,
				s.default,
				s.min,
				s.max
			);
		}
	}

	/// Schema invariant (iv): a power-of-two suboption's default is a power of two or zero.
	#[test]
	fn pow2_defaults_are_pow2_or_zero() {
		for s in SUBOPTIONS {
			if !s.power_of_two {
				continue;
			}
			assert!(
				s.default == 0 || utils::util::is_pow2(s.default),
				"{}.{} default {} is not a power of two",
				s.group,
				s.name,
				s.default
			);
		}
	}

	/// Schema invariant (ii): every conflict references a real suboption (trivially true here
	/// since `Opt` is an exhaustive enum, but every entry in `SUBOPTIONS` must still exist).
	#[test]
	fn every_opt_has_one_schema_entry() {
		for s in SUBOPTIONS {
			assert_eq!(SUBOPTIONS.iter().filter(|o| o.opt == s.opt).count(), 1);
		}
	}

	/// Schema invariant (i): suboption names within a group are unique.
	#[test]
	fn names_unique_within_group() {
		for group in ['b', 'd', 'i', 'l', 'n', 'r', 's', 'm'] {
			let names: Vec<_> = SUBOPTIONS.iter().filter(|s| s.group == group).map(|s| s.name).collect();
			let mut sorted = names.clone();
			sorted.sort_unstable();
			sorted.dedup();
			assert_eq!(names.len(), sorted.len(), "duplicate suboption name in group {group}");
		}
	}
}
