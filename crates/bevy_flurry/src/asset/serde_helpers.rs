use bevy::math::Vec2;

pub(crate) fn is_false(value: &bool) -> bool {
    !*value
}

pub(crate) fn is_zero_i32(value: &i32) -> bool {
    *value == 0
}

pub(crate) fn is_zero_vec2(value: &Vec2) -> bool {
    *value == Vec2::ZERO
}
