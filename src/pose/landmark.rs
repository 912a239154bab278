/// スタンス解析に使用する4つの体幹ランドマーク
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum LandmarkIndex {
    LeftShoulder = 0,
    RightShoulder = 1,
    LeftHip = 2,
    RightHip = 3,
}

impl LandmarkIndex {
    pub const COUNT: usize = 4;

    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::LeftShoulder),
            1 => Some(Self::RightShoulder),
            2 => Some(Self::LeftHip),
            3 => Some(Self::RightHip),
            _ => None,
        }
    }
}

/// 単一ランドマーク（正規化画像座標 0.0〜1.0）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// 2ランドマークの中点
    pub fn midpoint(&self, other: &Landmark) -> Landmark {
        Landmark::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

/// 1フレーム分の検出結果
/// 信頼度が閾値を下回った関節はNone
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LandmarkSet {
    joints: [Option<Landmark>; LandmarkIndex::COUNT],
}

impl LandmarkSet {
    /// 全関節が未検出の空集合
    pub fn new() -> Self {
        Self::default()
    }

    /// 4関節すべてが揃った集合
    pub fn complete(
        left_shoulder: Landmark,
        right_shoulder: Landmark,
        left_hip: Landmark,
        right_hip: Landmark,
    ) -> Self {
        Self {
            joints: [
                Some(left_shoulder),
                Some(right_shoulder),
                Some(left_hip),
                Some(right_hip),
            ],
        }
    }

    pub fn set(&mut self, index: LandmarkIndex, landmark: Landmark) {
        self.joints[index as usize] = Some(landmark);
    }

    pub fn get(&self, index: LandmarkIndex) -> Option<Landmark> {
        self.joints[index as usize]
    }

    /// 4関節すべてが検出済みか
    pub fn is_complete(&self) -> bool {
        self.joints.iter().all(|j| j.is_some())
    }
}
