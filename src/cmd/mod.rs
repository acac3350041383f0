//! CLI command implementations.
//!
//! | Module  | Commands handled                 |
//! |---------|----------------------------------|
//! | `board` | `Board`, `Add`, `Move`, `Rm`     |
//! | `serve` | `Serve`                          |

pub mod board;
pub mod serve;

pub use board::{cmd_add, cmd_board, cmd_move, cmd_rm};
pub use serve::cmd_serve;
