//! TaskFlow: personal to-do lists with due dates.
//!
//! Tasks live in a PostgreSQL `tasks` table that announces every write on a
//! notification channel. Each signed-in user gets a [`tasks::TaskAccessor`]
//! that keeps a full copy of their rows, re-fetched after every write and
//! every change notification. The tab views (`today`, `upcoming`, `all`,
//! `done`) are computed over that copy by [`tasks::filter`].

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod tasks;
