use thiserror::Error;

use crate::geometry::{SpatialPoint, FEET_PER_METER};
use crate::guide::suggest_camera_position;

/// セットアップの進行状態
///
/// 各状態が必要なデータだけを保持するため、不正な組み合わせ
/// （ホール未設定のままパット位置だけが存在する等）は表現できない。
/// 後戻りはreset()のみ。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SetupState {
    Idle,
    HoleSet {
        hole: SpatialPoint,
    },
    /// 両点が揃った遷移状態。推奨位置は設定のたびに即座に再計算されるため、
    /// set_putting_position()の完了後は常にCameraSuggestedに進んでいる。
    PuttingSet {
        hole: SpatialPoint,
        putting: SpatialPoint,
    },
    CameraSuggested {
        hole: SpatialPoint,
        putting: SpatialPoint,
        camera: SpatialPoint,
    },
    Locked {
        hole: SpatialPoint,
        putting: SpatialPoint,
        camera: SpatialPoint,
    },
}

impl SetupState {
    pub fn name(&self) -> &'static str {
        match self {
            SetupState::Idle => "Idle",
            SetupState::HoleSet { .. } => "HoleSet",
            SetupState::PuttingSet { .. } => "PuttingSet",
            SetupState::CameraSuggested { .. } => "CameraSuggested",
            SetupState::Locked { .. } => "Locked",
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    /// 現在の状態では許可されない操作。状態は変更されない
    #[error("invalid transition: {op} not allowed in state {state}")]
    InvalidTransition {
        op: &'static str,
        state: &'static str,
    },
}

/// パットセットアップのキャリブレーションセッション
///
/// 位置は空間トラッキング側が解決したワールド座標を受け取る。
/// 設定済みの位置の上書きはInvalidTransitionで拒否する
/// （上書き許可と拒否のどちらも取り得る仕様のため、拒否を採用）。
pub struct CalibrationSession {
    state: SetupState,
}

impl CalibrationSession {
    pub fn new() -> Self {
        Self {
            state: SetupState::Idle,
        }
    }

    pub fn state(&self) -> &SetupState {
        &self.state
    }

    /// ホール位置を設定（Idleでのみ許可）
    pub fn set_hole_position(&mut self, position: SpatialPoint) -> Result<(), SessionError> {
        match self.state {
            SetupState::Idle => {
                self.state = SetupState::HoleSet { hole: position };
                Ok(())
            }
            _ => Err(SessionError::InvalidTransition {
                op: "set_hole_position",
                state: self.state.name(),
            }),
        }
    }

    /// パット位置を設定（HoleSetでのみ許可）
    /// 距離と推奨カメラ位置を即座に再計算し、CameraSuggestedまで進む
    pub fn set_putting_position(&mut self, position: SpatialPoint) -> Result<(), SessionError> {
        match self.state {
            SetupState::HoleSet { hole } => {
                self.state = Self::advance(SetupState::PuttingSet {
                    hole,
                    putting: position,
                });
                Ok(())
            }
            _ => Err(SessionError::InvalidTransition {
                op: "set_putting_position",
                state: self.state.name(),
            }),
        }
    }

    /// PuttingSet → CameraSuggested の自動遷移
    fn advance(state: SetupState) -> SetupState {
        match state {
            SetupState::PuttingSet { hole, putting } => SetupState::CameraSuggested {
                hole,
                putting,
                camera: suggest_camera_position(&hole, &putting),
            },
            other => other,
        }
    }

    /// セットアップを確定。以降reset()まで位置の変更を受け付けない
    pub fn lock_setup(&mut self) -> Result<(), SessionError> {
        match self.state {
            SetupState::CameraSuggested {
                hole,
                putting,
                camera,
            } => {
                self.state = SetupState::Locked {
                    hole,
                    putting,
                    camera,
                };
                Ok(())
            }
            _ => Err(SessionError::InvalidTransition {
                op: "lock_setup",
                state: self.state.name(),
            }),
        }
    }

    /// どの状態からでもIdleに戻す
    pub fn reset(&mut self) {
        self.state = SetupState::Idle;
    }

    pub fn hole_position(&self) -> Option<SpatialPoint> {
        match self.state {
            SetupState::Idle => None,
            SetupState::HoleSet { hole }
            | SetupState::PuttingSet { hole, .. }
            | SetupState::CameraSuggested { hole, .. }
            | SetupState::Locked { hole, .. } => Some(hole),
        }
    }

    pub fn putting_position(&self) -> Option<SpatialPoint> {
        match self.state {
            SetupState::PuttingSet { putting, .. }
            | SetupState::CameraSuggested { putting, .. }
            | SetupState::Locked { putting, .. } => Some(putting),
            _ => None,
        }
    }

    pub fn suggested_camera_position(&self) -> Option<SpatialPoint> {
        match self.state {
            SetupState::CameraSuggested { camera, .. } | SetupState::Locked { camera, .. } => {
                Some(camera)
            }
            _ => None,
        }
    }

    /// ホール・パット間の距離（フィート）。両点が揃うまでは0
    pub fn distance_in_feet(&self) -> f32 {
        match (self.hole_position(), self.putting_position()) {
            (Some(hole), Some(putting)) => hole.distance_to(&putting) * FEET_PER_METER,
            _ => 0.0,
        }
    }

    pub fn is_locked(&self) -> bool {
        matches!(self.state, SetupState::Locked { .. })
    }
}

impl Default for CalibrationSession {
    fn default() -> Self {
        Self::new()
    }
}
