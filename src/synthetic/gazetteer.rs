//! Built-in city coordinates per ISO 3166-1 alpha-2 country code

/// (country code, [(latitude, longitude)]) for every supported country
const PLACES: &[(&str, &[(f64, f64)])] = &[
    ("AM", &[(40.1792, 44.4991), (40.7929, 43.8465)]),
    ("AR", &[(-34.6037, -58.3816), (-31.4201, -64.1888), (-32.9442, -60.6505)]),
    ("AT", &[(48.2082, 16.3738), (47.0707, 15.4395), (48.3069, 14.2858)]),
    (
        "AU",
        &[
            (-33.8688, 151.2093),
            (-37.8136, 144.9631),
            (-27.4698, 153.0251),
            (-31.9505, 115.8605),
        ],
    ),
    ("AZ", &[(40.4093, 49.8671), (40.6828, 46.3606)]),
    ("BD", &[(23.8103, 90.4125), (22.3569, 91.7832)]),
    ("BE", &[(50.8503, 4.3517), (51.2194, 4.4025), (51.0543, 3.7174)]),
    ("BR", &[(-23.5505, -46.6333), (-22.9068, -43.1729), (-15.7975, -47.8919)]),
    (
        "CA",
        &[
            (43.6532, -79.3832),
            (45.5017, -73.5673),
            (49.2827, -123.1207),
            (51.0447, -114.0719),
        ],
    ),
    ("CL", &[(-33.4489, -70.6693), (-33.0472, -71.6127)]),
    ("CO", &[(4.7110, -74.0721), (6.2442, -75.5812), (3.4516, -76.5320)]),
    ("CU", &[(23.1136, -82.3666), (20.0247, -75.8219)]),
    ("DZ", &[(36.7538, 3.0588), (35.6971, -0.6308), (36.3650, 6.6147)]),
    ("EG", &[(30.0444, 31.2357), (31.2001, 29.9187)]),
    ("MX", &[(19.4326, -99.1332), (20.6597, -103.3496), (25.6866, -100.3161)]),
    (
        "US",
        &[
            (40.7128, -74.0060),
            (34.0522, -118.2437),
            (41.8781, -87.6298),
            (29.7604, -95.3698),
            (37.7749, -122.4194),
        ],
    ),
];

/// Known places for a country, if the gazetteer covers it
pub fn places(country_code: &str) -> Option<&'static [(f64, f64)]> {
    PLACES
        .iter()
        .find(|(code, _)| *code == country_code)
        .map(|(_, places)| *places)
}

pub fn contains(country_code: &str) -> bool {
    places(country_code).is_some()
}
