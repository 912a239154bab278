use nalgebra::Vector3;

/// メートル→フィート変換係数
pub const FEET_PER_METER: f32 = 3.28084;

/// ワールド座標系の3D点（メートル単位、Yが鉛直軸）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialPoint {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl SpatialPoint {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// 原点
    pub fn origin() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    fn to_vector(self) -> Vector3<f32> {
        Vector3::new(self.x, self.y, self.z)
    }

    /// 2点間のユークリッド距離（メートル）
    pub fn distance_to(&self, other: &SpatialPoint) -> f32 {
        (other.to_vector() - self.to_vector()).norm()
    }

    /// 2点の中点
    pub fn midpoint(&self, other: &SpatialPoint) -> SpatialPoint {
        SpatialPoint::new(
            (self.x + other.x) / 2.0,
            (self.y + other.y) / 2.0,
            (self.z + other.z) / 2.0,
        )
    }

    /// otherへの単位方向ベクトル
    /// 2点が一致する場合は (1, 0, 0) を返す（NaNを伝播させない）
    pub fn direction_to(&self, other: &SpatialPoint) -> Vector3<f32> {
        let delta = other.to_vector() - self.to_vector();
        let norm = delta.norm();
        if norm < 1e-6 {
            return Vector3::new(1.0, 0.0, 0.0);
        }
        delta / norm
    }
}

/// 方向ベクトルの水平投影を鉛直軸まわりに90°回転した水平ベクトル
/// ホール・パット位置を結ぶ線に直交する
pub fn horizontal_perpendicular(direction: &Vector3<f32>) -> Vector3<f32> {
    Vector3::new(-direction.z, 0.0, direction.x)
}
