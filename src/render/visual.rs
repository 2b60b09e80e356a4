use serde::Serialize;

use crate::icons::Rgba;
use crate::models::{SeatStatus, UserId};

pub const AVAILABLE: Rgba = Rgba::new(46, 160, 67, 255);
pub const SELECTED: Rgba = Rgba::new(37, 99, 235, 255);
pub const HELD: Rgba = Rgba::new(217, 119, 6, 255);
pub const BOOKED: Rgba = Rgba::new(107, 114, 128, 255);
pub const INACTIVE: Rgba = Rgba::new(156, 163, 175, 255);

const INACTIVE_OPACITY: f64 = 0.35;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeatFill {
    Outline,
    Filled,
}

/// Дополнительная пометка поверх фигуры места.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeatMark {
    None,
    Glow,
    Lock,
    Cross,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeatVisual {
    pub fill: SeatFill,
    pub mark: SeatMark,
    pub color: Rgba,
    pub opacity: f64,
    pub interactive: bool,
    pub icon: bool,
}

impl SeatVisual {
    /// Внешний вид определяется только статусом, фактом выбора и наличием
    /// иконки (и билета: без него место неактивно).
    pub fn derive(
        status: Option<SeatStatus>,
        is_selected: bool,
        has_icon: bool,
        has_ticket: bool,
        current_user: UserId,
    ) -> Self {
        let base = |fill, mark, color| SeatVisual { fill, mark, color, opacity: 1.0, interactive: true, icon: has_icon };

        let visual = match status {
            _ if is_selected => base(SeatFill::Filled, SeatMark::Glow, SELECTED),
            Some(SeatStatus::SelectedLocal) => base(SeatFill::Filled, SeatMark::Glow, SELECTED),
            Some(SeatStatus::Available) => base(SeatFill::Outline, SeatMark::None, AVAILABLE),
            // Своё удержание без локального выбора (например, из прошлого сеанса)
            Some(SeatStatus::HeldRemote(Some(owner))) if owner == current_user => {
                base(SeatFill::Outline, SeatMark::None, SELECTED)
            }
            Some(SeatStatus::HeldRemote(_)) => SeatVisual {
                interactive: false,
                ..base(SeatFill::Filled, SeatMark::Lock, HELD)
            },
            Some(SeatStatus::Booked) => SeatVisual {
                interactive: false,
                ..base(SeatFill::Filled, SeatMark::Cross, BOOKED)
            },
            Some(SeatStatus::Disabled) | None => SeatVisual {
                opacity: INACTIVE_OPACITY,
                interactive: false,
                ..base(SeatFill::Outline, SeatMark::None, INACTIVE)
            },
        };

        if has_ticket {
            visual
        } else {
            SeatVisual { opacity: INACTIVE_OPACITY, interactive: false, color: INACTIVE, ..visual }
        }
    }
}
