pub mod culture;
pub mod group;
pub mod lcs;

pub use culture::fold_case;
pub use group::{group_adjacent, split_after};
pub use lcs::{common_prefix_len, common_suffix_len, longest_common_run, Hashable, MatchResult};
