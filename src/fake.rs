//! Fake but plausible library rows. Every generated username, email and
//! ISBN carries a fresh uuid so rows never collide across a run.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use uuid::Uuid;

use crate::types::{NewBook, NewUser, RefId};

const GIVEN_NAMES: &[&str] = &[
	"Budi", "Siti", "Agus", "Dewi", "Rizky", "Putri", "Andi", "Ayu", "Hendra", "Nur",
];
const FAMILY_NAMES: &[&str] = &[
	"Santoso", "Wijaya", "Saputra", "Lestari", "Hidayat", "Kusuma", "Pratama", "Permata",
];
const TITLE_WORDS: &[&str] = &[
	"Pelangi", "Samudra", "Bumi", "Senja", "Hujan", "Negeri", "Cahaya", "Rumah", "Langit", "Jalan",
];
const LANGUAGES: &[&str] = &["Indonesia", "English", "Jawa"];

/// Catalogue row every fake book points at; seeded by `DB::seed_reference_data`.
pub const SEEDED_REFERENCE_ID: RefId = 1;

#[derive(Debug)]
pub struct Faker {
	rng: StdRng,
}

impl Faker {
	pub fn new() -> Self {
		Faker{ rng: StdRng::from_entropy() }
	}

	/// Same names, titles and numbers for the same seed; unique keys still differ.
	pub fn seeded(seed: u64) -> Self {
		Faker{ rng: StdRng::seed_from_u64(seed) }
	}

	pub fn unique_token(&mut self) -> String {
		Uuid::new_v4().simple().to_string()[..12].to_string()
	}

	pub fn full_name(&mut self) -> String {
		let given = GIVEN_NAMES.choose(&mut self.rng).copied().unwrap_or("Budi");
		let family = FAMILY_NAMES.choose(&mut self.rng).copied().unwrap_or("Santoso");
		format!("{given} {family}")
	}

	pub fn username(&mut self) -> String {
		format!("user_{}", self.unique_token())
	}

	pub fn email(&mut self, full_name: &str) -> String {
		let local = full_name.to_lowercase().replace(' ', ".");
		format!("{local}.{}@example.id", self.unique_token())
	}

	/// Indonesian mobile number, "+62 8xx-xxxx-xxxx".
	pub fn phone(&mut self) -> String {
		let a: u16 = self.rng.gen_range(11..=99);
		let b: u16 = self.rng.gen_range(0..10_000);
		let c: u16 = self.rng.gen_range(0..10_000);
		format!("+62 8{a:02}-{b:04}-{c:04}")
	}

	/// 13 digits starting 978; uniqueness comes from the uuid, not the check digit.
	pub fn isbn(&mut self) -> String {
		let digits = Uuid::new_v4().as_u128() % 10_000_000_000;
		format!("978{digits:010}")
	}

	pub fn title(&mut self) -> String {
		let words: Vec<&str> = TITLE_WORDS.choose_multiple(&mut self.rng, 2).copied().collect();
		format!("{} {}", words.join(" "), self.rng.gen_range(1..=9))
	}

	pub fn user(&mut self) -> NewUser {
		let full_name = self.full_name();
		let mut user = NewUser::new(self.username(), self.email(&full_name));
		user.full_name = Some(full_name);
		user.phone = Some(self.phone());
		user
	}

	/// Five copies, three on the shelf, pointing at the seeded catalogue rows.
	pub fn book(&mut self) -> NewBook {
		let mut book = NewBook::new(self.isbn(), self.title()).with_copies(5, 3);
		book.author_id = Some(SEEDED_REFERENCE_ID);
		book.publisher_id = Some(SEEDED_REFERENCE_ID);
		book.category_id = Some(SEEDED_REFERENCE_ID);
		book.publication_year = Some(self.rng.gen_range(1980..=2023));
		book.pages = Some(self.rng.gen_range(80..=600));
		book.language = LANGUAGES.choose(&mut self.rng).map(|l| l.to_string());
		book.description = Some(format!("Buku uji integritas {}", self.unique_token()));
		book.price_cents = Some(self.rng.gen_range(25_000..=150_000) * 100);
		book.location = Some(format!("Rak {}-{}", self.rng.gen_range('A'..='F'), self.rng.gen_range(1..=20)));
		book
	}
}

impl Default for Faker {
	fn default() -> Self {
		Faker::new()
	}
}
