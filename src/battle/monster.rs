/// Template data for one encounter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Monster {
    pub ordinal: usize,
    pub name: &'static str,
    pub max_hp: i32,
    pub dialogue: &'static str,
}

/// Encounters in the order they are fought.
pub const MONSTERS: [Monster; 4] = [
    Monster {
        ordinal: 0,
        name: "Slime",
        max_hp: 80,
        dialogue: "The slime dissolves!",
    },
    Monster {
        ordinal: 1,
        name: "Goblin",
        max_hp: 120,
        dialogue: "The goblin flees!",
    },
    Monster {
        ordinal: 2,
        name: "Sorcerer",
        max_hp: 200,
        dialogue: "The sorcerer vanishes!",
    },
    Monster {
        ordinal: 3,
        name: "Dragon",
        max_hp: 300,
        dialogue: "The dragon falls!",
    },
];

impl Monster {
    pub fn get(ordinal: usize) -> Option<&'static Monster> {
        MONSTERS.get(ordinal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roster_is_ordered_and_numbered() {
        let hp: Vec<i32> = MONSTERS.iter().map(|m| m.max_hp).collect();
        assert_eq!(hp, vec![80, 120, 200, 300]);

        for (i, monster) in MONSTERS.iter().enumerate() {
            assert_eq!(monster.ordinal, i);
            assert!(monster.max_hp > 0);
        }
        assert_eq!(Monster::get(3).map(|m| m.name), Some("Dragon"));
        assert!(Monster::get(4).is_none());
    }
}
