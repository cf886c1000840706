use rand::Rng;

pub const ITEM_ID_LEN: usize = 12;
pub const ITEM_ID_ALPHABET: &str =
    "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz-";

/// Supplies ids for new items and groups. Only uniqueness matters to the
/// order index; collisions are left to the generator's odds.
pub trait IdSource {
    fn next_id(&mut self) -> String;
}

/// 12 symbols from a 64-symbol alphabet, 72 bits per id.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIdSource;

impl IdSource for RandomIdSource {
    fn next_id(&mut self) -> String {
        random_id()
    }
}

/// Predictable ids (`prefix1`, `prefix2`, ...) for tests and fixtures.
#[derive(Debug, Clone)]
pub struct SequentialIdSource {
    prefix: String,
    next: u64,
}

impl SequentialIdSource {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: 1,
        }
    }
}

impl IdSource for SequentialIdSource {
    fn next_id(&mut self) -> String {
        let id = format!("{}{}", self.prefix, self.next);
        self.next += 1;
        id
    }
}

pub fn random_id() -> String {
    let mut rng = rand::rng();
    let alphabet = ITEM_ID_ALPHABET.as_bytes();
    let mut id = String::with_capacity(ITEM_ID_LEN);
    for _ in 0..ITEM_ID_LEN {
        let idx = rng.random_range(0..alphabet.len());
        id.push(alphabet[idx] as char);
    }
    id
}

pub fn is_valid_item_id(value: &str) -> bool {
    if value.len() != ITEM_ID_LEN {
        return false;
    }
    value.chars().all(|ch| ITEM_ID_ALPHABET.contains(ch))
}
