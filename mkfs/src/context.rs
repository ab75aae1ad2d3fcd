//! Dynamic option state (`spec.md` §3.2, §3.4): the mutable twin of the static [`schema`] table.
//!
//! A [`Context`] starts out holding every suboption's declared default, is mutated only by the
//! parser (`set`) and by default fill-in (`fill_defaults`), and is read-only from the geometry
//! solver onward — mirroring the "parser+geometry pipeline threading an explicit context" called
//! for in `spec.md` §9 in place of the source's pervasive global option table.

use std::collections::HashMap;

use crate::alias;
use crate::error::Error;
use crate::schema::{self, Opt};
use crate::value::{Value, ValueKind};

/// One suboption's live state: its current value (default until overwritten) and whether the
/// user literally typed it (as opposed to receiving it via alias derivation or default fill-in).
#[derive(Clone)]
pub struct OptionState {
	pub value: Value,
	pub seen: bool,
}

/// Identifies the unit of respecification tracking: either a single non-aliased suboption, or
/// one of the alias groups in [`alias::GROUPS`] (indexed by position in that slice).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
enum GroupKey {
	Multi(usize),
	Single(Opt),
}

/// The suboption name first used to commit a group, kept so a later write through a different
/// alias reports respecification under the name the user originally typed (`spec.md` §9).
struct Commit {
	group: char,
	name: &'static str,
}

fn group_key(opt: Opt) -> GroupKey {
	match alias::GROUPS.iter().position(|g| g.members().any(|m| m == opt)) {
		Some(i) => GroupKey::Multi(i),
		None => GroupKey::Single(opt),
	}
}

fn default_value(opt: Opt, kind: ValueKind, default: u64) -> Value {
	match kind {
		ValueKind::Bool => Value::Bool(default != 0),
		ValueKind::Num => Value::Num(default),
		// Every other `Str`-kind suboption (device paths, UUIDs) has no meaningful default and
		// stays unset until the user writes it. `n_version` is the one exception: `spec.md` §4.3
		// gives it a real default ("2", i.e. no ASCII-CI) alongside the `ci` keyword.
		ValueKind::Str if opt == Opt::n_version => Value::Str("2".to_owned()),
		ValueKind::Str => Value::None,
	}
}

pub struct Context {
	states: HashMap<Opt, OptionState>,
	commits: HashMap<GroupKey, Commit>,
	/// Non-fatal diagnostics accumulated during default fill-in and topology resolution
	/// (`TopologyMismatch`-class messages, §7), printed by `main` unless `-q`.
	pub warnings: Vec<String>,
}

impl Context {
	pub fn new() -> Self {
		let states = schema::SUBOPTIONS
			.iter()
			.map(|s| {
				(
					s.opt,
					OptionState {
						value: default_value(s.opt, s.kind, s.default),
						seen: false,
					},
				)
			})
			.collect();
		Self {
			states,
			commits: HashMap::new(),
			warnings: Vec::new(),
		}
	}

	/// Records that `opt` was assigned `value` by the user. Propagates the derived value to
	/// every other member of `opt`'s alias group (without marking them `seen`), and fails
	/// `Respecified` if `opt`'s group already has a committed write — using the name that
	/// committed it, per `spec.md` §9.
	pub fn set(&mut self, opt: Opt, value: Value) -> Result<(), Error> {
		let s = schema::get(opt);
		let key = group_key(opt);
		if let Some(commit) = self.commits.get(&key) {
			return Err(Error::respecified(commit.group, commit.name));
		}
		self.commits.insert(
			key,
			Commit {
				group: s.group,
				name: s.name,
			},
		);
		if let Some(group) = alias::static_group_of(opt) {
			for (peer, derived) in group.derive(opt, &value) {
				if let Some(entry) = self.states.get_mut(&peer) {
					entry.value = derived;
				}
			}
		}
		let entry = self.states.get_mut(&opt).expect("every Opt has state");
		entry.value = value;
		entry.seen = true;
		Ok(())
	}

	pub fn is_seen(&self, opt: Opt) -> bool {
		self.states.get(&opt).map(|s| s.seen).unwrap_or(false)
	}

	/// True if `opt` or any member of its alias group was explicitly written by the user.
	pub fn group_seen(&self, opt: Opt) -> bool {
		match alias::static_group_of(opt) {
			Some(group) => group.members().any(|m| self.is_seen(m)),
			None => self.is_seen(opt),
		}
	}

	pub fn value(&self, opt: Opt) -> &Value {
		&self.states.get(&opt).expect("every Opt has state").value
	}

	pub fn num(&self, opt: Opt) -> u64 {
		self.value(opt).as_num()
	}

	pub fn bool_(&self, opt: Opt) -> bool {
		self.value(opt).as_bool()
	}

	pub fn str_(&self, opt: Opt) -> &str {
		self.value(opt).as_str()
	}

	/// Default fill-in (`spec.md` §4.3), run once after parsing and after the data device's
	/// sector sizes are known. `imaxpct`'s default is deliberately not computed here: it depends
	/// on the final filesystem byte size, which only the geometry solver knows
	/// (`crate::geometry::default_imaxpct`).
	pub fn fill_defaults(&mut self, device_sectors: Option<(u64, u64)>) {
		if !self.group_seen(Opt::d_sectlog) {
			if let Some((physical, logical)) = device_sectors {
				let block_size = self.num(Opt::b_size);
				let sector_size = if physical > block_size {
					self.warnings.push(format!(
						"device physical sector size {physical} is larger than the requested \
						 block size {block_size}; using logical sector size {logical} instead"
					));
					logical
				} else {
					physical
				};
				self.assign_sector_size(sector_size);
			}
		}

		if !self.group_seen(Opt::l_sectlog) {
			let data_sectsize = self.num(Opt::d_sectsize);
			let data_sectlog = self.num(Opt::d_sectlog);
			self.set_default(Opt::l_sectlog, Value::Num(data_sectlog));
			self.set_default(Opt::l_sectsize, Value::Num(data_sectsize));
		}

		if !self.group_seen(Opt::i_log) && !self.is_seen(Opt::i_perblock) {
			let inode_log = if self.bool_(Opt::m_crc) { 9 } else { 8 };
			self.set_default(Opt::i_log, Value::Num(inode_log));
			self.set_default(Opt::i_size, Value::Num(1 << inode_log));
		}

		if !self.group_seen(Opt::n_log) {
			let block_size = self.num(Opt::b_size);
			let dir_block_size = block_size.max(4096);
			let dir_block_log = utils::util::log2(dir_block_size).unwrap_or(12);
			self.set_default(Opt::n_log, Value::Num(dir_block_log));
			self.set_default(Opt::n_size, Value::Num(dir_block_size));
		}
	}

	/// Writes a computed default into `opt` without marking it `seen` and without going through
	/// respecification tracking (fill-in never conflicts with itself).
	fn set_default(&mut self, opt: Opt, value: Value) {
		if let Some(entry) = self.states.get_mut(&opt) {
			entry.value = value;
		}
	}

	/// Overwrites `opt`'s value with a resolver-computed one (topology resolution, §4.5),
	/// bypassing respecification tracking. Used only for values the user may have already
	/// supplied, where the resolved value legitimately takes precedence (e.g. adopting the
	/// device's stripe geometry when the user gave none).
	pub fn force(&mut self, opt: Opt, value: Value) {
		self.set_default(opt, value);
	}

	fn assign_sector_size(&mut self, sector_size: u64) {
		let sector_log = utils::util::log2(sector_size).unwrap_or(9);
		for opt in [Opt::d_sectlog, Opt::s_log, Opt::s_sectlog] {
			self.set_default(opt, Value::Num(sector_log));
		}
		for opt in [Opt::d_sectsize, Opt::s_size, Opt::s_sectsize] {
			self.set_default(opt, Value::Num(sector_size));
		}
	}
}

impl Default for Context {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn second_write_through_same_name_is_respecified() {
		let mut ctx = Context::new();
		ctx.set(Opt::d_size, Value::Num(1024)).unwrap();
		let err = ctx.set(Opt::d_size, Value::Num(2048)).unwrap_err();
		assert_eq!(err.message, "-d size option respecified");
	}

	#[test]
	fn second_write_through_alias_is_respecified_under_first_name() {
		let mut ctx = Context::new();
		ctx.set(Opt::b_size, Value::Num(4096)).unwrap();
		let err = ctx.set(Opt::b_log, Value::Num(12)).unwrap_err();
		assert_eq!(err.message, "-b size option respecified");
	}

	#[test]
	fn alias_write_propagates_without_marking_peer_seen() {
		let mut ctx = Context::new();
		ctx.set(Opt::b_size, Value::Num(8192)).unwrap();
		assert_eq!(ctx.num(Opt::b_log), 13);
		assert!(!ctx.is_seen(Opt::b_log));
		assert!(ctx.group_seen(Opt::b_log));
	}

	#[test]
	fn sector_agree_across_groups_still_respecifies() {
		let mut ctx = Context::new();
		ctx.set(Opt::d_sectlog, Value::Num(9)).unwrap();
		let err = ctx.set(Opt::d_sectsize, Value::Num(512)).unwrap_err();
		assert_eq!(err.message, "-d sectlog option respecified");
	}

	#[test]
	fn inode_log_default_follows_crc() {
		let mut ctx = Context::new();
		ctx.set(Opt::m_crc, Value::Bool(false)).unwrap();
		ctx.fill_defaults(None);
		assert_eq!(ctx.num(Opt::i_log), 8);
		assert_eq!(ctx.num(Opt::i_size), 256);
	}

	#[test]
	fn dir_block_default_is_max_of_block_size_and_4096() {
		let mut ctx = Context::new();
		ctx.set(Opt::b_size, Value::Num(8192)).unwrap();
		ctx.fill_defaults(None);
		assert_eq!(ctx.num(Opt::n_size), 8192);
	}

	#[test]
	fn sector_size_downgrades_when_physical_exceeds_block_size() {
		let mut ctx = Context::new();
		ctx.set(Opt::b_size, Value::Num(1024)).unwrap();
		ctx.fill_defaults(Some((4096, 512)));
		assert_eq!(ctx.num(Opt::d_sectsize), 512);
		assert_eq!(ctx.warnings.len(), 1);
	}
}
