//! # pledger-ledger — Ledger Gateway
//!
//! The lifecycle engine and the revocation protocol talk to the append-only
//! ledger only through the contracts in this crate:
//!
//! - [`LedgerGateway`]: submit a message to a topic, fetch messages.
//! - [`TopicProvisioner`]: create topics, cross-link them.
//! - [`AccountResolver`]: map owners and users to paying ledger accounts.
//!
//! [`MemoryLedger`] and [`MemoryAccounts`] implement them in process. They
//! honour namespaces exactly like a production gateway would: a message
//! sent under `Namespace::DryRun(p)` is invisible under
//! `Namespace::Production`, and `discard_sandbox(p)` drops it.
//!
//! ## Append-only
//!
//! Nothing on a topic is ever mutated. Revoking a message appends a
//! revocation record that targets it; the `revoked` flag of a fetched
//! message is derived from those records.

pub mod account;
pub mod error;
pub mod gateway;
pub mod memory;
pub mod message;
pub mod retry;
pub mod topic;

pub use account::{AccountResolver, LedgerAccount, MemoryAccounts, RegisteredUser, UserRole};
pub use error::LedgerError;
pub use gateway::{LedgerGateway, MessageSender, SendContext, TopicProvisioner};
pub use memory::MemoryLedger;
pub use message::{
    ContentLocator, LedgerMessage, MessageAction, MessageDraft, MessageFilter, MessageType,
    Revocation, SubmitReceipt,
};
pub use topic::{ProvisionedTopic, TopicKeys, TopicSpec, TopicType};
