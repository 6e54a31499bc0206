// SPDX-License-Identifier: Apache-2.0

pub mod bounded_channel;
pub mod filter;
pub mod harvest;
pub mod init;
pub mod output;
