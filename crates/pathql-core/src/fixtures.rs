//! Bundled sample data.
//!
//! The sample store holds three small graphs:
//!
//! - `Person`/`Note`/`Foo`: three people, two of whom link the same note
//!   with different `@metanote` link properties;
//! - `Obj`/`Tgt`: objects with overlapping `tgt` links;
//! - `User`/`Card`/`Award`: a card game with `@count` on decks and
//!   `@nickname` on friends.
//!
//! Ids in the first two graphs are `ffffffff-ffff-ffff-ffff-<n>`; see [`sample_id`].

use crate::error::Error;
use crate::store::Store;
use pathql_proto::ObjectId;

/// The sample fixture as JSON.
pub const SAMPLE_FIXTURE: &str = include_str!("../fixtures/sample.json");

/// Load the sample store.
pub fn sample_store() -> Result<Store, Error> {
    Store::from_json(SAMPLE_FIXTURE)
}

/// Identifier `ffffffff-ffff-ffff-ffff-{n:012x}` used by the sample fixture.
pub fn sample_id(n: u64) -> ObjectId {
    ObjectId::from_u128((0xffff_ffff_ffff_ffff_ffff_u128 << 48) | u128::from(n))
}
