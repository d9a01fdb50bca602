// SPDX-License-Identifier: GPL-3.0-or-later
pub mod artists;
pub mod auth;
pub mod curator;
pub mod player;
