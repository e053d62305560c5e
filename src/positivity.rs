pub mod candidate_set;
pub mod make_positive;
