use glam::{Mat4, Vec3};

pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y: f32,
    pub aspect: f32,
    pub z_near: f32,
    pub z_far: f32,
}

impl Camera {
    /// Perspective camera at the origin looking down -Z; `fov_y_degrees` is vertical
    pub fn perspective(fov_y_degrees: f32, aspect: f32, z_near: f32, z_far: f32) -> Self {
        Self {
            eye: Vec3::ZERO,
            target: Vec3::NEG_Z,
            up: Vec3::Y,
            fov_y: fov_y_degrees.to_radians(),
            aspect,
            z_near,
            z_far,
        }
    }

    pub fn set_aspect(&mut self, width: u32, height: u32) {
        if height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    pub fn look_at(&mut self, target: Vec3) {
        self.target = target;
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }

    pub fn view_proj(&self) -> Mat4 {
        let proj = Mat4::perspective_rh(self.fov_y, self.aspect, self.z_near, self.z_far);
        proj * self.view()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_projects_to_screen_centre() {
        let mut cam = Camera::perspective(75.0, 16.0 / 9.0, 0.1, 1000.0);
        cam.eye = Vec3::new(0.0, 5.0, 10.0);
        cam.look_at(Vec3::ZERO);
        let clip = cam.view_proj() * Vec3::ZERO.extend(1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-5 && ndc.y.abs() < 1e-5);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }

    #[test]
    fn zero_height_keeps_aspect() {
        let mut cam = Camera::perspective(75.0, 2.0, 0.1, 1000.0);
        cam.set_aspect(800, 0);
        assert_eq!(cam.aspect, 2.0);
    }
}
