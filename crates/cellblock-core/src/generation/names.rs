//! Name generation for guards and inmates

use crate::components::Name;
use rand::Rng;

/// Chance an inmate goes by a yard nickname
const NICKNAME_CHANCE: f64 = 0.3;

/// Generate a random name
pub fn generate_name(rng: &mut impl Rng) -> Name {
    let given = GIVEN_NAMES[rng.gen_range(0..GIVEN_NAMES.len())];
    let family = FAMILY_NAMES[rng.gen_range(0..FAMILY_NAMES.len())];

    Name::new(given, family)
}

/// Generate an inmate name, sometimes with a nickname
pub fn generate_inmate_name(rng: &mut impl Rng) -> Name {
    let name = generate_name(rng);
    if rng.gen_bool(NICKNAME_CHANCE) {
        name.with_nickname(NICKNAMES[rng.gen_range(0..NICKNAMES.len())])
    } else {
        name
    }
}

static GIVEN_NAMES: &[&str] = &[
    "Dale", "Frank", "Luis", "Marcus", "Terrence", "Walt", "Eddie", "Ray",
    "Gloria", "Denise", "Tanya", "Rosa", "Maureen", "Kim", "Carla", "Joan",
    "Vic", "Hector", "Bernard", "Tomasz", "Andre", "Nikolai", "Jamal", "Curtis",
    "Irene", "Lorraine", "Paula", "Shirley", "Yolanda", "Bea", "Nell", "Dot",
];

static FAMILY_NAMES: &[&str] = &[
    "Kowalski", "Brennan", "Moreno", "Whitaker", "Doyle", "Fischer", "Okafor", "Reyes",
    "Sullivan", "Hayes", "Lindqvist", "Castellano", "Pruitt", "Mahoney", "Dubois", "Novak",
    "Greer", "Tran", "Abernathy", "Rooney", "Vasquez", "Hale", "Mercer", "Quinlan",
];

static NICKNAMES: &[&str] = &[
    "Knuckles", "Spider", "Doc", "Slim", "Tiny", "Ace", "Lefty", "Whisper", "Tank", "Smokey",
];

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_generate_name() {
        let mut rng = StdRng::seed_from_u64(3);
        let name = generate_name(&mut rng);

        assert!(!name.given.is_empty());
        assert!(!name.family.is_empty());
        assert!(name.nickname.is_none());
    }

    #[test]
    fn test_inmate_names_vary() {
        let mut rng = StdRng::seed_from_u64(11);
        let names: Vec<Name> = (0..200).map(|_| generate_inmate_name(&mut rng)).collect();

        let unique_family: std::collections::HashSet<_> = names.iter().map(|n| &n.family).collect();
        assert!(unique_family.len() > 10);
        assert!(names.iter().any(|n| n.nickname.is_some()));
        assert!(names.iter().any(|n| n.nickname.is_none()));
    }
}
