//! Human-readable names for map and gamemode identifiers

/// Last path segment of a map identifier ("Levels/MP_001/MP_001" -> "MP_001")
pub fn level_name(map: &str) -> &str {
    map.rsplit('/').next().unwrap_or(map)
}

/// Display name for a map, falling back to its level name.
pub fn map_name(map: &str) -> String {
    let name = match map {
        "Levels/MP_001/MP_001" => "Grand Bazaar",
        "Levels/MP_003/MP_003" => "Tehran Highway",
        "Levels/MP_007/MP_007" => "Caspian Border",
        "Levels/MP_011/MP_011" => "Seine Crossing",
        "Levels/MP_012/MP_012" => "Operation Firestorm",
        "Levels/MP_013/MP_013" => "Damavand Peak",
        "Levels/MP_017/MP_017" => "Noshahr Canals",
        "Levels/MP_018/MP_018" => "Kharg Island",
        "Levels/MP_Subway/MP_Subway" => "Operation Metro",
        "Levels/XP1_001/XP1_001" => "Strike at Karkand",
        "Levels/XP1_002/XP1_002" => "Gulf of Oman",
        "Levels/XP1_003/XP1_003" => "Sharqi Peninsula",
        "Levels/XP1_004/XP1_004" => "Wake Island",
        "Levels/XP2_Factory/XP2_Factory" => "Scrapmetal",
        "Levels/XP2_Office/XP2_Office" => "Operation 925",
        "Levels/XP2_Palace/XP2_Palace" => "Donya Fortress",
        "Levels/XP2_Skybar/XP2_Skybar" => "Ziba Tower",
        "Levels/XP3_Desert/XP3_Desert" => "Bandar Desert",
        "Levels/XP3_Alborz/XP3_Alborz" => "Alborz Mountains",
        "Levels/XP3_Shield/XP3_Shield" => "Armored Shield",
        "Levels/XP3_Valley/XP3_Valley" => "Death Valley",
        "Levels/XP4_FD/XP4_FD" => "Markaz Monolith",
        "Levels/XP4_Parl/XP4_Parl" => "Azadi Palace",
        "Levels/XP4_Quake/XP4_Quake" => "Epicenter",
        "Levels/XP4_Rubble/XP4_Rubble" => "Talah Market",
        "Levels/XP5_001/XP5_001" => "Operation Riverside",
        "Levels/XP5_002/XP5_002" => "Nebandan Flats",
        "Levels/XP5_003/XP5_003" => "Kiasar Railroad",
        "Levels/XP5_004/XP5_004" => "Sabalan Pipeline",
        "Levels/COOP_002/COOP_002" => "Hit and Run",
        "Levels/COOP_003/COOP_003" => "Drop 'Em Like Liquid",
        "Levels/COOP_006/COOP_006" => "Fire from the Sky",
        "Levels/COOP_007/COOP_007" => "Operation Exodus",
        "Levels/COOP_009/COOP_009" => "Exfiltration",
        "Levels/COOP_010/COOP_010" => "The Eleventh Hour",
        "Levels/SP_Bank/SP_Bank" => "Operation Guillotine",
        "Levels/SP_Earthquake/SP_Earthquake" => "Operation Swordbreaker",
        "Levels/SP_Earthquake2/SP_Earthquake2" => "Uprising",
        "Levels/SP_Finale/SP_Finale" => "The Great Destroyer",
        "Levels/SP_Interrogation/SP_Interrogation" => "Intro",
        "Levels/SP_Jet/SP_Jet" => "Going Hunting",
        "Levels/SP_New_York/SP_New_York" => "Semper Fidelis",
        "Levels/SP_Paris/SP_Paris" => "Comrades",
        "Levels/SP_Sniper/SP_Sniper" => "Night Shift",
        "Levels/SP_Tank/SP_Tank" => "Thunder Run",
        "Levels/SP_Tank_b/SP_Tank_b" => "Fear No Evil",
        "Levels/SP_Valley/SP_Valley" => "Rock and a Hard Place",
        "Levels/SP_Villa/SP_Villa" => "Kaffarov's Villa",
        _ => level_name(map),
    };
    name.to_string()
}

/// Display name for a gamemode, falling back to [`humanize_identifier`].
pub fn gamemode_name(gamemode: &str) -> String {
    let name = match gamemode {
        "ConquestLarge0" => "Conquest Large",
        "ConquestSmall0" => "Conquest",
        "ConquestAssaultLarge0" => "Conquest Assault Large",
        "ConquestAssaultSmall0" => "Conquest Assault",
        "ConquestAssaultSmall1" => "Conquest Assault #2",
        "RushLarge0" => "Rush",
        "SquadRush0" => "Squad Rush",
        "SquadDeathMatch0" => "Squad Deathmatch",
        "TeamDeathMatch0" => "Team Deathmatch",
        "TeamDeathMatchC0" => "Team Deathmatch CQ",
        "CaptureTheFlag0" => "Capture the Flag",
        "AirSuperiority0" => "Air Superiority",
        "GunMaster0" => "Gun Master",
        "Scavenger0" => "Scavenger",
        "TankSuperiority0" => "Tank Superiority",
        "Domination0" => "Conquest Domination",
        _ => return humanize_identifier(gamemode),
    };
    name.to_string()
}

/// Whether a bundled background image exists for this map
pub fn has_map_image(map: &str) -> bool {
    map.starts_with("Levels/") && map_name(map) != level_name(map)
}

/// "KingOfTheHill0" -> "King Of The Hill", "CustomMode2" -> "Custom Mode #2".
///
/// Steps run in order: split lower/upper camel boundaries, drop one
/// trailing "0", then turn a trailing number (1 or more) into " #N".
pub fn humanize_identifier(raw: &str) -> String {
    let mut spaced = String::with_capacity(raw.len() + 8);
    let mut prev: Option<char> = None;
    for c in raw.chars() {
        if let Some(p) = prev {
            if p.is_ascii_lowercase() && c.is_ascii_uppercase() {
                spaced.push(' ');
            }
        }
        spaced.push(c);
        prev = Some(c);
    }

    if spaced.ends_with('0') {
        spaced.pop();
    }

    let digits_start = spaced
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i);

    if let Some(start) = digits_start {
        // the suffix must not start with 0: skip leading zeros of the run
        let run = &spaced[start..];
        if let Some(offset) = run.find(|c: char| c != '0') {
            let number_start = start + offset;
            let number = spaced[number_start..].to_string();
            spaced.truncate(number_start);
            spaced.push_str(" #");
            spaced.push_str(&number);
        }
    }

    spaced
}
