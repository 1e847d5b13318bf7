//! Quillpost - A small server-rendered blog
//!
//! This library provides the building blocks of the Quillpost server:
//! configuration, storage, business rules, templates and HTTP routing.

pub mod config;
pub mod db;
pub mod models;
pub mod services;
pub mod theme;
pub mod web;
