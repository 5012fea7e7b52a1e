//! Atrium - page tree resolution for a multi-site CMS
//!
//! Maps request paths to draft or public pages, honouring publication
//! windows, editor permissions and the page tree, and hands out free slugs
//! for copied pages.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
