//! Фиксированный набор глифов мест. Контуры в системе координат 24x24,
//! заливка по правилу non-zero.

pub const VIEWBOX: f64 = 24.0;

/// Именованный глиф: одна или несколько замкнутых фигур.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Glyph {
    pub name: &'static str,
    pub paths: &'static [&'static str],
}

const GLYPHS: &[Glyph] = &[
    Glyph {
        name: "chair",
        paths: &[
            // спинка
            "M6 3 H18 Q19 3 19 4 V11 H5 V4 Q5 3 6 3 Z",
            // сиденье
            "M4 12 H20 V15 H4 Z",
            // ножки
            "M5 15 H7 V21 H5 Z",
            "M17 15 H19 V21 H17 Z",
        ],
    },
    Glyph {
        name: "chair-wide",
        paths: &[
            "M3 4 H21 V11 H3 Z",
            "M2 12 H22 V15 H2 Z",
            "M3 15 H5 V21 H3 Z",
            "M19 15 H21 V21 H19 Z",
        ],
    },
    Glyph {
        name: "sofa",
        paths: &[
            "M5 6 C5 4.9 5.9 4 7 4 H17 C18.1 4 19 4.9 19 6 V11 H5 Z",
            // подлокотники
            "M1 10 H4 V18 H1 Z",
            "M20 10 H23 V18 H20 Z",
            "M4 12 H20 V18 H4 Z",
            "M3 18 H5 V20 H3 Z",
            "M19 18 H21 V20 H19 Z",
        ],
    },
    Glyph {
        name: "sofa-corner",
        paths: &[
            "M3 3 H11 V13 H21 V21 H3 Z",
            "M13 3 H21 V11 H13 Z",
        ],
    },
    Glyph {
        name: "table-round",
        paths: &[
            "M12 3 C17 3 21 5 21 8 C21 11 17 13 12 13 C7 13 3 11 3 8 C3 5 7 3 12 3 Z",
            "M11 13 H13 V19 H11 Z",
            "M7 19 H17 V21 H7 Z",
        ],
    },
    Glyph {
        name: "table-square",
        paths: &[
            "M2 6 H22 V9 H2 Z",
            "M4 9 H6 V21 H4 Z",
            "M18 9 H20 V21 H18 Z",
        ],
    },
    Glyph {
        name: "wheelchair",
        paths: &[
            // голова
            "M10 1 C11.1 1 12 1.9 12 3 C12 4.1 11.1 5 10 5 C8.9 5 8 4.1 8 3 C8 1.9 8.9 1 10 1 Z",
            "M9 6 H12 V11 H17 V13 H9 Z",
            "M15 13 H17 L20 19 L18 20 Z",
            // колесо: внешний и внутренний контур с противоположным обходом
            "M10 10 C13.3 10 16 12.7 16 16 C16 19.3 13.3 22 10 22 C6.7 22 4 19.3 4 16 C4 12.7 6.7 10 10 10 Z \
             M10 12 C7.8 12 6 13.8 6 16 C6 18.2 7.8 20 10 20 C12.2 20 14 18.2 14 16 C14 13.8 12.2 12 10 12 Z",
        ],
    },
];

pub fn lookup(name: &str) -> Option<&'static Glyph> {
    GLYPHS.iter().find(|g| g.name == name)
}

pub fn names() -> impl Iterator<Item = &'static str> {
    GLYPHS.iter().map(|g| g.name)
}
