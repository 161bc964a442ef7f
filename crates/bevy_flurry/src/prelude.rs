pub use crate::FlurryPlugin;

pub use crate::asset::{
    BurstEntry, EmitterTemplate, ParticleTemplateAsset, Sample, SubImageGrid, Variation,
    VariationKind,
};

pub use crate::instance::{
    AttachParent, EmitterAnchor, Particle, ParticleSystemInstance, Placement, SystemState,
};
pub use crate::manager::{InstanceId, ParticleManager};
pub use crate::random::{ParticleRng, RandomSource};
pub use crate::render::{QuadBatch, QuadInstance, QuadRenderer};
pub use crate::spawning::{EmitterFinished, EmitterInstance, ParticleEmitter, ParticleSettings};
