use super::landmark::{LandmarkIndex, LandmarkSet};

/// 1フレーム分のスタンスメトリクス
/// フレームごとに再計算され、保持されない
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseMetrics {
    /// 腰中点→肩中点ベクトルの符号付き角度（ラジアン）。前後の傾きの指標
    pub body_angle_rad: f32,
    /// 左右の腰ランドマークのX方向距離（正規化画像単位）。スタンス幅の指標
    pub stance_width: f32,
}

/// ランドマーク集合からスタンスメトリクスを算出
///
/// 4関節のいずれかが欠けている場合はNone。部分的なメトリクスは返さない。
/// フレーム間の平滑化は行わない（各フレーム独立）。
pub fn extract_metrics(landmarks: &LandmarkSet) -> Option<PoseMetrics> {
    let left_shoulder = landmarks.get(LandmarkIndex::LeftShoulder)?;
    let right_shoulder = landmarks.get(LandmarkIndex::RightShoulder)?;
    let left_hip = landmarks.get(LandmarkIndex::LeftHip)?;
    let right_hip = landmarks.get(LandmarkIndex::RightHip)?;

    let shoulder_mid = left_shoulder.midpoint(&right_shoulder);
    let hip_mid = left_hip.midpoint(&right_hip);

    let body_angle_rad = (shoulder_mid.y - hip_mid.y).atan2(shoulder_mid.x - hip_mid.x);
    let stance_width = (left_hip.x - right_hip.x).abs();

    Some(PoseMetrics {
        body_angle_rad,
        stance_width,
    })
}
