pub mod resolver;
pub mod notifier;

pub use resolver::AvailabilityResolver;
pub use notifier::{NotifierPlugin, NotificationResult};
