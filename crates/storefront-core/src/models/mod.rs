//! Data models for storefront entities.
//!
//! This module contains the records returned by the storefront API:
//!
//! - `User`: account record returned by `/me` and `/register`
//! - `Resource`, `Review`: catalog entries and their reviews
//! - `Page`: the pagination envelope wrapping list responses

pub mod resource;
pub mod user;

pub use resource::{NewReview, Page, Resource, Review, ReviewAuthor};
pub use user::{Registration, User};
