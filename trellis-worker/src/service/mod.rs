//! Service layer
//!
//! Services contain the worker's business logic: translating recipe
//! resource references between name and permalink form, and externalizing
//! run artifacts to object storage. All upstream dependencies are
//! trait-based to enable testing and dependency injection.

pub mod externalizer;
mod translator;

pub use translator::RecipeTranslator;
