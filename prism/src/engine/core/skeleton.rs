use nalgebra::Isometry3;
use std::collections::HashMap;

/// One bone of a skeleton descriptor. Parents must be declared before their
/// children so indices into `SkeletonDescriptor::bones` stay valid.
#[derive(Debug, Clone)]
pub struct BoneDescriptor {
    pub name: String,
    /// Parent bone index; `None` for roots.
    pub parent: Option<usize>,
    pub bind_pose: Isometry3<f32>,
}

/// A single keyframe of a bone track.
#[derive(Debug, Copy, Clone)]
pub struct Keyframe {
    pub time: f32,
    pub pose: Isometry3<f32>,
}

/// Keyframes for one named bone within an animation clip.
#[derive(Debug, Clone)]
pub struct TrackDescriptor {
    pub bone: String,
    pub keyframes: Vec<Keyframe>,
}

/// A named animation clip. Clip names are the keys used by the skeleton
/// animation API.
#[derive(Debug, Clone)]
pub struct AnimationDescriptor {
    pub name: String,
    pub length: f32,
    pub tracks: Vec<TrackDescriptor>,
}

/// Complete skeleton description carried by a mesh descriptor.
#[derive(Debug, Clone, Default)]
pub struct SkeletonDescriptor {
    pub bones: Vec<BoneDescriptor>,
    pub animations: Vec<AnimationDescriptor>,
}

/// Index-aligned bone table built from a [`SkeletonDescriptor`].
#[derive(Debug, Default, Clone)]
pub struct Bones {
    /// Index-aligned bone names.
    pub names: Vec<String>,
    /// Parent bone index; None for roots.
    pub parents: Vec<Option<usize>>,
    pub children: Vec<Vec<usize>>,
    pub roots: Vec<usize>,
    pub bind_local: Vec<Isometry3<f32>>,
    /// Fast lookup from name to index.
    pub index_of: HashMap<String, usize>,
}

impl Bones {
    pub fn from_descriptor(desc: &SkeletonDescriptor) -> Bones {
        let n = desc.bones.len();
        let mut bones = Bones {
            names: Vec::with_capacity(n),
            parents: Vec::with_capacity(n),
            children: vec![Vec::new(); n],
            roots: Vec::new(),
            bind_local: Vec::with_capacity(n),
            index_of: HashMap::with_capacity(n),
        };

        for (i, bone) in desc.bones.iter().enumerate() {
            bones.names.push(bone.name.clone());
            bones.bind_local.push(bone.bind_pose);
            // forward references would break the hierarchy visit
            let parent = bone.parent.filter(|p| *p < i);
            bones.parents.push(parent);
            match parent {
                Some(p) => bones.children[p].push(i),
                None => bones.roots.push(i),
            }
            bones.index_of.insert(bone.name.clone(), i);
        }

        bones
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn index(&self, name: &str) -> Option<usize> {
        self.index_of.get(name).copied()
    }
}

#[derive(Debug, Clone)]
struct Track {
    bone: usize,
    keyframes: Vec<Keyframe>,
}

impl Track {
    fn sample(&self, time: f32) -> Option<Isometry3<f32>> {
        let first = self.keyframes.first()?;
        if time <= first.time {
            return Some(first.pose);
        }
        let last = self.keyframes.last()?;
        if time >= last.time {
            return Some(last.pose);
        }

        let next = self.keyframes.iter().position(|k| k.time > time)?;
        let (a, b) = (&self.keyframes[next - 1], &self.keyframes[next]);
        let span = b.time - a.time;
        if span <= f32::EPSILON {
            return Some(b.pose);
        }
        let t = (time - a.time) / span;
        Some(a.pose.lerp_slerp(&b.pose, t))
    }
}

/// Runtime animation clip with bone names resolved against a [`Bones`] table.
/// Tracks naming bones absent from the skeleton are dropped at build time.
#[derive(Debug, Clone)]
pub struct AnimationClip {
    pub name: String,
    pub length: f32,
    tracks: Vec<Track>,
}

impl AnimationClip {
    pub fn from_descriptor(desc: &AnimationDescriptor, bones: &Bones) -> AnimationClip {
        let tracks = desc
            .tracks
            .iter()
            .filter_map(|track| {
                let bone = bones.index(&track.bone)?;
                Some(Track {
                    bone,
                    keyframes: track.keyframes.clone(),
                })
            })
            .collect();

        AnimationClip {
            name: desc.name.clone(),
            length: desc.length.max(0.0),
            tracks,
        }
    }

    /// Samples the clip for `bone` at `time`; `None` when the clip has no
    /// track for that bone.
    pub fn sample(&self, bone: usize, time: f32) -> Option<Isometry3<f32>> {
        self.tracks
            .iter()
            .find(|t| t.bone == bone)
            .and_then(|t| t.sample(time))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Translation3, UnitQuaternion, Vector3};

    fn pose(x: f32) -> Isometry3<f32> {
        Isometry3::from_parts(
            Translation3::from(Vector3::new(x, 0.0, 0.0)),
            UnitQuaternion::identity(),
        )
    }

    fn two_bone_skeleton() -> SkeletonDescriptor {
        SkeletonDescriptor {
            bones: vec![
                BoneDescriptor {
                    name: "root".into(),
                    parent: None,
                    bind_pose: pose(0.0),
                },
                BoneDescriptor {
                    name: "tip".into(),
                    parent: Some(0),
                    bind_pose: pose(1.0),
                },
            ],
            animations: vec![],
        }
    }

    #[test]
    fn bone_table_from_descriptor() {
        let bones = Bones::from_descriptor(&two_bone_skeleton());
        assert_eq!(bones.len(), 2);
        assert_eq!(bones.roots, vec![0]);
        assert_eq!(bones.children[0], vec![1]);
        assert_eq!(bones.index("tip"), Some(1));
        assert_eq!(bones.index("missing"), None);
    }

    #[test]
    fn track_sampling_interpolates_and_clamps() {
        let bones = Bones::from_descriptor(&two_bone_skeleton());
        let clip = AnimationClip::from_descriptor(
            &AnimationDescriptor {
                name: "slide".into(),
                length: 2.0,
                tracks: vec![TrackDescriptor {
                    bone: "tip".into(),
                    keyframes: vec![
                        Keyframe {
                            time: 0.0,
                            pose: pose(0.0),
                        },
                        Keyframe {
                            time: 2.0,
                            pose: pose(4.0),
                        },
                    ],
                }],
            },
            &bones,
        );

        let mid = clip.sample(1, 1.0).unwrap();
        assert!((mid.translation.x - 2.0).abs() < 1e-6);

        let clamped = clip.sample(1, 10.0).unwrap();
        assert!((clamped.translation.x - 4.0).abs() < 1e-6);

        assert!(clip.sample(0, 1.0).is_none());
    }

    #[test]
    fn unknown_track_bones_are_dropped() {
        let bones = Bones::from_descriptor(&two_bone_skeleton());
        let clip = AnimationClip::from_descriptor(
            &AnimationDescriptor {
                name: "broken".into(),
                length: 1.0,
                tracks: vec![TrackDescriptor {
                    bone: "no_such_bone".into(),
                    keyframes: vec![Keyframe {
                        time: 0.0,
                        pose: pose(1.0),
                    }],
                }],
            },
            &bones,
        );

        assert!(clip.sample(0, 0.0).is_none());
        assert!(clip.sample(1, 0.0).is_none());
    }
}
