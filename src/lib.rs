//! Client-side data layer for a document management service.
//!
//! [`query`] is an async cache keyed by structural [`query::QueryKey`]s with
//! prefix invalidation and pessimistic mutations. [`views`] binds each
//! resource family (documents, annotations, signatures, stamps) to it on top
//! of the [`api::DocumentService`] REST client, and [`db`] keeps an offline
//! catalog of document listings. [`app`] and [`commands`] drive it all from
//! the command line.

pub mod api;
pub mod app;
pub mod commands;
pub mod config;
pub mod db;
pub mod event;
pub mod format;
pub mod keys;
pub mod query;
pub mod views;
