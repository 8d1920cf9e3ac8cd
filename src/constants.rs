pub const PAGE_SIZE: i64 = 6;
pub const MAX_PAGE_SIZE: i64 = 100;
pub const SUBSCRIPTION_RECIPES_LIMIT: i64 = 5;

pub const SHOPPING_LIST_FILENAME: &str = "Spisok_pokypok.txt";

pub const MAX_BODY_SIZE: u64 = 16 * 1024 * 1024;
