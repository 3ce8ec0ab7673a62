//! Domain objects for resources and tools
//!
//! Provides the resource entity, its concrete variants, URI templates, tool
//! handlers and the registries that hold them.

use std::{future::Future, pin::Pin};

pub mod errors;
pub mod registry;
pub mod resource_types;
pub mod resources;
pub mod templates;
pub mod tools;
pub mod uri;
pub mod utils;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
