//! Name generation for generated pawns
//!
//! Picks from small bundled lists. Good enough for placeholders and ancestors
//! that are rarely shown by name.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::components::Gender;

const MALE_FIRST_NAMES: &[&str] = &[
    "Abe", "Bram", "Cyrus", "Dane", "Elias", "Fenn", "Gideon", "Hale", "Ivo", "Jonas",
    "Kellan", "Lorne", "Marek", "Nils", "Oren", "Pike", "Quill", "Rowan", "Silas", "Tobin",
    "Ulric", "Vance", "Wade", "Yorick", "Zeke",
];

const FEMALE_FIRST_NAMES: &[&str] = &[
    "Ada", "Brielle", "Cora", "Delia", "Edda", "Faye", "Greta", "Hanna", "Iris", "Juna",
    "Kira", "Lena", "Mira", "Nell", "Opal", "Petra", "Rhea", "Saoirse", "Tess", "Una",
    "Vera", "Wren", "Yara", "Zora",
];

const LAST_NAMES: &[&str] = &[
    "Ashdown", "Barrow", "Calder", "Draper", "Ellery", "Fairweather", "Garrick", "Holloway",
    "Ingram", "Jessop", "Kettering", "Larkin", "Marlow", "Norcross", "Oakes", "Pryor",
    "Quarles", "Radley", "Stroud", "Thorne", "Upton", "Vickers", "Whitlock", "Yardley",
];

/// Random first name for the given gender. `None` picks from either list.
pub fn random_first_name<R: Rng + ?Sized>(gender: Option<Gender>, rng: &mut R) -> &'static str {
    let list = match gender {
        Some(Gender::Male) => MALE_FIRST_NAMES,
        Some(Gender::Female) => FEMALE_FIRST_NAMES,
        None if rng.gen::<bool>() => MALE_FIRST_NAMES,
        None => FEMALE_FIRST_NAMES,
    };
    list.choose(rng).copied().unwrap_or("Nobody")
}

pub fn random_last_name<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    LAST_NAMES.choose(rng).copied().unwrap_or("")
}
