pub mod args;
pub mod dispatch;
pub mod lifecycle;
pub mod policy;
pub mod presence;
pub mod registry;
pub mod session;

pub use aether_store::{AllowList, ConfigStore, StatusDescriptor, StoreError};
pub use args::{Args, Lookup};
pub use dispatch::{CommandError, Dispatcher, InboundMessage};
pub use lifecycle::{ExitRequest, ExitSignal, ProcessRestarter};
pub use policy::{AccessPolicy, Actor};
pub use presence::{ActivityKind, PresenceManager};
pub use registry::{Action, CommandRegistry, CommandSpec, ParamShape, Privilege, Section};
pub use session::{
    CardField, GuildOverview, InfoCard, MemberProfile, PlatformError, RoleRef, Session,
};
