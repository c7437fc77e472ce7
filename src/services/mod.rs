//! Business logic services.
//!
//! This module contains the pending-email poller and the adapters it is
//! wired to: the approval API client, the settings store, the capability
//! gate and the three alert channels.
//!
//! Services depend on the small traits in `alerts`, `mail_client` and
//! `settings`, so they can be tested with in-memory fakes.

pub mod alerts;
pub mod capability;
pub mod credentials;
pub mod desktop_notifier;
pub mod mail_client;
pub mod notification_poller;
pub mod settings;
pub mod sound;
pub mod toasts;

pub use alerts::{AlertDispatcher, NotificationSink, SoundSink, ToastSink};
pub use capability::CapabilityGate;
pub use credentials::CredentialService;
pub use desktop_notifier::DesktopNotifier;
pub use mail_client::{MailApiClient, MailApiConfig, PendingEmailSource};
pub use notification_poller::{CheckOutcome, NotificationPoller, PollerDeps, PollerStatus};
pub use settings::{MemoryStore, SettingsStore};
pub use sound::RodioSound;
pub use toasts::BroadcastToasts;
