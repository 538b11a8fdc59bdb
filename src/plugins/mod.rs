pub mod traits;
pub mod manager;
pub mod resolvers;
pub mod notifiers;

pub use manager::ResolverRegistry;
pub use traits::{AvailabilityResolver, NotifierPlugin};
