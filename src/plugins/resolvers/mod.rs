pub mod heuristic;
pub mod select_option;

pub use heuristic::HeuristicResolver;
pub use select_option::SelectOptionResolver;
