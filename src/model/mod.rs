//! Core data model: message entities and extraction results.

pub mod entity;
pub mod extraction;
