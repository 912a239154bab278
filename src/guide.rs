use crate::geometry::{horizontal_perpendicular, SpatialPoint};

/// 推奨視点の目線高さ（メートル、約5.5フィート）
pub const EYE_HEIGHT_M: f32 = 1.68;

/// 正三角形を作るオフセット比率 √3/2
const EQUILATERAL_RATIO: f32 = 0.866_025_4;

/// ホール位置とパット位置から推奨観察位置を算出
///
/// 上から見てホール・パット位置・推奨位置が正三角形になるよう、
/// 2点の中点から垂直方向に距離×√3/2だけオフセットする。
/// 高さは中点の地形高さに関係なく目線高さで固定。
/// 2点が一致する縮退入力でもNaNを返さず、中点の真上の定義済みの点を返す。
pub fn suggest_camera_position(hole: &SpatialPoint, putting: &SpatialPoint) -> SpatialPoint {
    let midpoint = hole.midpoint(putting);
    let direction = hole.direction_to(putting);
    let perpendicular = horizontal_perpendicular(&direction);

    let distance = hole.distance_to(putting);
    let offset = perpendicular * (distance * EQUILATERAL_RATIO);

    SpatialPoint::new(midpoint.x + offset.x, EYE_HEIGHT_M, midpoint.z + offset.z)
}
