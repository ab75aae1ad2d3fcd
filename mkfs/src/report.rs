//! The dry-run / pre-write geometry report (`spec.md` §6.3: `-N` always prints it; otherwise
//! suppressed by `-q`). Format grounded on the `meta-data=.../data.../naming.../log.../realtime=`
//! table `xfs_mkfs.c` prints before writing (`examples/original_source/mkfs/xfs_mkfs.c`'s
//! report `printf`), reproduced with Rust's `{:width$}` formatting in place of `printf`'s
//! `%-22s`/`%-6lld`.

use std::fmt::Write as _;

use crate::geometry::Geometry;

/// Renders the geometry report exactly once, independent of the device path or label (those are
/// passed in separately since [`Geometry`] doesn't carry the target's display name).
pub fn render(geom: &Geometry, data_name: &str, log_name: &str, rt_name: &str) -> String {
	let f = &geom.features;
	let mut out = String::new();

	let _ = writeln!(
		out,
		"meta-data={data_name:<22} isize={:<6} agcount={}, agsize={} blks",
		geom.inode_size, geom.ag_count, geom.ag_size
	);
	let _ = writeln!(
		out,
		"         ={:<22} sectsz={:<5} attr={}, projid32bit={}",
		"", geom.sector_size, f.attr_version, f.projid32bit as u8
	);
	let _ = writeln!(
		out,
		"         ={:<22} crc={:<8} finobt={}, sparse={}, rmapbt={}, reflink={}",
		"", f.crc as u8, f.finobt as u8, f.sparse_inodes as u8, f.rmapbt as u8, f.reflink as u8
	);
	let _ = writeln!(
		out,
		"data     ={data_name:<22} bsize={:<6} blocks={}, imaxpct={}",
		geom.block_size, geom.data_blocks, geom.i_maxpct
	);
	let _ = writeln!(
		out,
		"         ={:<22} sunit={:<6} swidth={} blks",
		"", geom.d_sunit, geom.d_swidth
	);
	let _ = writeln!(
		out,
		"naming   =version {:<14} bsize={:<6} ascii-ci=0, ftype={}",
		if f.ftype { 2 } else { 1 },
		geom.dir_block_size,
		f.ftype as u8
	);
	let _ = writeln!(
		out,
		"log      ={log_name:<22} bsize={:<6} blocks={}, version={}",
		geom.block_size, geom.log_blocks, f.log_version
	);
	let _ = writeln!(
		out,
		"         ={:<22} sectsz={:<5} sunit={} blks, lazy-count={}",
		"", geom.log_sector_size, geom.l_sunit / geom.block_size.max(1), f.lazy_sb_counters as u8
	);
	let _ = writeln!(
		out,
		"realtime ={rt_name:<22} extsz={:<6} blocks={}, rtextents={}",
		geom.rt_ext_blocks * geom.block_size,
		geom.rt_blocks,
		geom.rt_extents
	);

	out
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::context::Context;
	use crate::topology::Stripe;

	#[test]
	fn report_names_every_section() {
		let ctx = Context::new();
		let inputs = crate::geometry::Inputs {
			data_device_bytes: 256 * 1024 * 1024,
			data_is_file: true,
			stripe: Stripe::default(),
			log_device_blocks: None,
			rt_device_bytes: None,
			rt_stripe_bytes: None,
		};
		let geom = crate::geometry::solve(&ctx, [0u8; 16], &mut Vec::new(), &inputs).unwrap();
		let text = render(&geom, "/tmp/img", "internal", "none");
		for label in ["meta-data=", "data     =", "naming   =", "log      =", "realtime ="] {
			assert!(text.contains(label), "missing section {label}");
		}
	}
}
