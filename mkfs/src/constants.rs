//! On-disk format limits.
//!
//! Mirrors the `XFS_*` macros in `xfs_format.h` (not part of this retrieval pack; values below
//! match the public XFS on-disk format documentation and `xfs_mkfs`'s own option ranges).

/// Smallest legal filesystem block size, in bytes.
pub const XFS_MIN_BLOCKSIZE: u64 = 1 << XFS_MIN_BLOCKSIZE_LOG;
/// `log2` of [`XFS_MIN_BLOCKSIZE`].
pub const XFS_MIN_BLOCKSIZE_LOG: u8 = 9;
/// Largest legal filesystem block size, in bytes.
pub const XFS_MAX_BLOCKSIZE: u64 = 1 << XFS_MAX_BLOCKSIZE_LOG;
/// `log2` of [`XFS_MAX_BLOCKSIZE`].
pub const XFS_MAX_BLOCKSIZE_LOG: u8 = 16;

/// Smallest legal sector size, in bytes.
pub const XFS_MIN_SECTORSIZE: u64 = 1 << XFS_MIN_SECTORSIZE_LOG;
/// `log2` of [`XFS_MIN_SECTORSIZE`].
pub const XFS_MIN_SECTORSIZE_LOG: u8 = 9;
/// Largest legal sector size, in bytes.
pub const XFS_MAX_SECTORSIZE: u64 = 1 << XFS_MAX_SECTORSIZE_LOG;
/// `log2` of [`XFS_MAX_SECTORSIZE`].
pub const XFS_MAX_SECTORSIZE_LOG: u8 = 15;

/// Smallest legal inode size, in bytes.
pub const XFS_DINODE_MIN_SIZE: u64 = 1 << XFS_DINODE_MIN_LOG;
/// `log2` of [`XFS_DINODE_MIN_SIZE`].
pub const XFS_DINODE_MIN_LOG: u8 = 8;
/// Largest legal inode size, in bytes.
pub const XFS_DINODE_MAX_SIZE: u64 = 1 << XFS_DINODE_MAX_LOG;
/// `log2` of [`XFS_DINODE_MAX_SIZE`].
pub const XFS_DINODE_MAX_LOG: u8 = 11;

/// Minimum number of fs blocks a directory-block-size literal may resolve to (`log2`).
pub const XFS_MIN_REC_DIRSIZE: u8 = 9;

/// Minimum total data blocks accepted for the data subvolume.
pub const XFS_MIN_DATA_BLOCKS: u64 = 4096;

/// Smallest allocation group, in blocks, independent of block size.
pub const XFS_MIN_AG_BLOCKS: u64 = 64;

/// Largest `agblock_t` value: the AG-relative block number is a 31-bit magnitude (the high bit
/// of the 32-bit field is reserved), so `ag_size` can never reach `2^32`.
pub const XFS_AG_MAX_BLOCKS_ABS: u64 = (1u64 << 31) - 1;

/// Returns the minimum AG size, in blocks, for a given block size. Independent of `block_log` in
/// this format family, but kept as a function (per `spec.md` §3.3/§4.6) since other derivations
/// are block-size dependent and callers should not need to know which.
pub const fn xfs_ag_min_blocks(_block_log: u8) -> u64 {
	XFS_MIN_AG_BLOCKS
}

/// Returns the maximum AG size, in blocks, for a given block size.
pub const fn xfs_ag_max_blocks(_block_log: u8) -> u64 {
	XFS_AG_MAX_BLOCKS_ABS
}

/// Largest legal AG count: one less than the reserved "null AG number" sentinel.
pub const XFS_MAX_AGNUMBER: u64 = 0xffff_fffe;

/// Minimum log size, in blocks, regardless of filesystem size.
pub const XFS_MIN_LOG_BLOCKS: u64 = 512;
/// Maximum log size, in blocks.
pub const XFS_MAX_LOG_BLOCKS: u64 = 0x0010_0000;
/// Minimum log size, in bytes (filesystems at or above 1 GiB get at least this much log).
pub const XFS_MIN_LOG_BYTES: u64 = 2 * 1024 * 1024;
/// Maximum log size, in bytes.
pub const XFS_MAX_LOG_BYTES: u64 = 2u64 * 1024 * 1024 * 1024;
/// Scale factor applied to `min_logblocks` for the 1 GiB-16 GiB default log sizing band.
pub const XFS_DFL_LOG_FACTOR: u64 = 3;
/// Data-to-log block ratio used for filesystems of 16 GiB and above.
pub const XFS_DFL_LOG_RATIO: u64 = 2048;

/// Largest log stripe unit accepted, in bytes (one log record's worth).
pub const XLOG_MAX_RECORD_BSIZE: u64 = 256 * 1024;

/// Smallest legal realtime extent size, in bytes.
pub const XFS_MIN_RTEXTSIZE: u64 = 4 * 1024;
/// Largest legal realtime extent size, in bytes.
pub const XFS_MAX_RTEXTSIZE: u64 = 1024 * 1024 * 1024;

/// Per-AG inode-chunk size in the "big cluster" CRC-mode inode alignment rule (§4.6 phase 10).
pub const XFS_INODE_BIG_CLUSTER_SIZE: u64 = 8192;
/// Number of inodes in one allocation chunk.
pub const XFS_INODES_PER_CHUNK: u64 = 64;

/// Offset, in bytes, of `WHACK_SIZE` worth of zeroing performed at both ends of a block device to
/// obliterate foreign filesystem signatures (§4.7, §5).
pub const WHACK_SIZE: u64 = 128 * 1024;

/// Per-AG header reservation, in blocks, at the low end of every AG (superblock, AGF, AGFL, AGI).
pub const XFS_PREALLOC_BLOCKS: u32 = 4;
