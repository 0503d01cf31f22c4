//! Cross-process coordination for driving a local `gpg2` binary: the
//! passphrase database, the keyed advisory file lock, and the
//! subprocess driver that injects passphrases expect-style.

mod agent;
mod error;
mod gpg;
mod lock;
mod passphrase_db;

pub use agent::restart_gpg_agent;
pub use error::{Error, Result};
pub use gpg::{Gpg, KeyListing};
pub use lock::KeyLock;
pub use passphrase_db::{KeyRecord, PassphraseDb, PassphraseSource};
