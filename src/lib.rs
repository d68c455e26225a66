pub mod messaging;
pub mod trajectory;
pub mod test_util;
