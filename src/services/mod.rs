//! Domain services used by the HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own auth state, provider access and content rules so route
//! handlers can stay focused on protocol translation and cookie plumbing.
//! `cache` and `guard` are the access-control core; `auth` composes them with
//! the identity provider and CMS sync into account flows.

pub mod auth;
pub mod cache;
pub mod cms_sync;
pub mod cookie_store;
pub mod gating;
pub mod guard;
pub mod identity;
pub mod redirect;
pub mod supabase;
