use std::collections::HashMap;
use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::DVec3;

use splatprep_3d::camera::{Camera, CameraModel};
use splatprep_3d::io::colmap;
use splatprep_3d::model::{Frame, Observation, Point3d, SparseModel, TrackElement};
use splatprep_3d::trajectory::{interpolate_poses, InterpolationOptions, KeyframePose};
use splatprep_lie::{se3::SE3, so3::SO3};

fn synthetic_model(num_frames: u32, num_observations: u32) -> SparseModel {
    let camera = Camera::new(
        1,
        CameraModel::OpenCV,
        5568,
        4872,
        vec![3480.0, 3480.0, 2784.0, 2436.0, 0.01, -0.002, 0.0001, 0.0002],
    )
    .unwrap();

    let frames = (1..=num_frames)
        .map(|i| {
            let pose = SE3::new(
                SO3::exp(DVec3::new(0.0, 0.01 * i as f64, 0.0)),
                DVec3::new(i as f64, 0.5, -0.25),
            );
            let mut frame = Frame::new(i, 1, pose, format!("2019A GP Left ({i}).png"));
            frame.observations = (0..num_observations)
                .map(|j| Observation {
                    xy: [j as f64 * 1.5, j as f64 * 0.75],
                    point3d_id: (j % 3 != 0).then_some(j as u64),
                })
                .collect();
            frame
        })
        .collect();

    let points3d = (0..num_observations as u64)
        .map(|j| Point3d {
            point3d_id: j,
            xyz: [j as f64, 2.0, 3.0],
            rgb: [10, 20, 30],
            error: 0.5,
            track: vec![TrackElement {
                frame_id: 1,
                observation_index: j as u32,
            }],
        })
        .collect();

    SparseModel::new(vec![camera], frames, points3d)
}

fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("colmap_codec");

    for num_frames in [100, 1000] {
        let model = synthetic_model(num_frames, 200);
        let binary = colmap::encode_binary(&model);
        let text = colmap::encode_text(&model);

        group.bench_with_input(BenchmarkId::new("encode_binary", num_frames), &model, |b, m| {
            b.iter(|| black_box(colmap::encode_binary(m)))
        });

        group.bench_with_input(BenchmarkId::new("decode_binary", num_frames), &binary, |b, f| {
            b.iter(|| black_box(colmap::decode_binary(&f.borrowed()).unwrap()))
        });

        group.bench_with_input(BenchmarkId::new("encode_text", num_frames), &model, |b, m| {
            b.iter(|| black_box(colmap::encode_text(m)))
        });

        group.bench_with_input(BenchmarkId::new("decode_text", num_frames), &text, |b, f| {
            b.iter(|| black_box(colmap::decode_text(&f.borrowed()).unwrap()))
        });
    }
    group.finish();
}

fn bench_interpolate(c: &mut Criterion) {
    let mut group = c.benchmark_group("interpolate_poses");

    for num_frames in [1000, 10000] {
        let sequence = (1..=num_frames)
            .map(|i| format!("2019A GP Left ({i}).png"))
            .collect::<Vec<_>>();
        let keyframes = sequence
            .iter()
            .enumerate()
            .step_by(15)
            .map(|(i, name)| {
                let pose = KeyframePose {
                    camera_id: 1,
                    camera_from_world: SE3::new(
                        SO3::exp(DVec3::new(0.0, 0.001 * i as f64, 0.0)),
                        DVec3::new(i as f64, 0.0, 0.0),
                    ),
                };
                (name.clone(), pose)
            })
            .collect::<HashMap<_, _>>();
        let options = InterpolationOptions::default();

        group.bench_with_input(
            BenchmarkId::new("interpolate_poses", num_frames),
            &sequence,
            |b, s| b.iter(|| black_box(interpolate_poses(s, &keyframes, &options).unwrap())),
        );
    }
    group.finish();
}

criterion_group!(benches, bench_codec, bench_interpolate);
criterion_main!(benches);
