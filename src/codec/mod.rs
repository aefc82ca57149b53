//! Wire codec for shared-object messages.
//!
//! A message body is a list of `field=value` tokens joined by `&`:
//!
//! ```text
//! mqsh.cmd=update&mqsh.subject=/node/a%/node/b&mqsh.type=hash&mqsh.pairs=|#0#stat~ok%4|#1#stat~down%9
//! ```
//!
//! - `mqsh.cmd`: `update`, `muxupdate`, `bcrequest`, `bcreply`, `delete`, `remove`
//! - `mqsh.subject`: one name, a `prefix*` / `*suffix` pattern, or a `%` joined list
//! - `mqsh.type`: `hash` or `queue`
//! - `mqsh.pairs`: `|key~value%changeid...`, keys prefixed `#<subject index>#`
//!   when the subject field lists more than one subject
//! - `mqsh.keys`: `|key1|key2...`
//! - `mqsh.reply`: reply address of a broadcast request
//!
//! User text is escaped with [`seal`] so that it never collides with the
//! structural characters above.

mod message;
mod seal;
mod subject;

pub use message::*;
pub use seal::*;
pub use subject::*;

#[cfg(test)]
mod codec_test;
