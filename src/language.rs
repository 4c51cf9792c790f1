//! Language code translation.
//!
//! Callers pass ISO 639-1 codes ("en"). Some providers index subtitles by the
//! ISO 639-2/B code ("eng") instead.

const ISO639_1_TO_2: &[(&str, &str)] = &[
    ("ar", "ara"),
    ("bg", "bul"),
    ("bs", "bos"),
    ("ca", "cat"),
    ("cs", "cze"),
    ("da", "dan"),
    ("de", "ger"),
    ("el", "ell"),
    ("en", "eng"),
    ("es", "spa"),
    ("et", "est"),
    ("eu", "baq"),
    ("fa", "per"),
    ("fi", "fin"),
    ("fr", "fre"),
    ("gl", "glg"),
    ("he", "heb"),
    ("hi", "hin"),
    ("hr", "hrv"),
    ("hu", "hun"),
    ("id", "ind"),
    ("is", "ice"),
    ("it", "ita"),
    ("ja", "jpn"),
    ("ko", "kor"),
    ("lt", "lit"),
    ("lv", "lav"),
    ("mk", "mac"),
    ("ms", "may"),
    ("nl", "dut"),
    ("no", "nor"),
    ("pl", "pol"),
    ("pt", "por"),
    ("ro", "rum"),
    ("ru", "rus"),
    ("sk", "slo"),
    ("sl", "slv"),
    ("sq", "alb"),
    ("sr", "scc"),
    ("sv", "swe"),
    ("th", "tha"),
    ("tr", "tur"),
    ("uk", "ukr"),
    ("vi", "vie"),
    ("zh", "chi"),
];

/// Map a two-letter code to its three-letter form. Unknown codes, including
/// codes that are already three letters long, are returned unchanged.
pub fn to_iso639_2(code: &str) -> &str {
    ISO639_1_TO_2
        .iter()
        .find(|(short, _)| short.eq_ignore_ascii_case(code))
        .map(|(_, long)| *long)
        .unwrap_or(code)
}
