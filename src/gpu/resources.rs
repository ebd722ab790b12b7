use crate::gpu::texture::Geometry;

/// Resources derived from an image geometry
///
/// Holds whatever a stage builds for the current frame size (filter memory,
/// scratch buffers) and rebuilds it through one function whenever the
/// geometry changes.
#[derive(Debug)]
pub struct SizedResources<R> {
    geometry: Option<Geometry>,
    resources: Option<R>,
}

impl<R> Default for SizedResources<R> {
    fn default() -> Self {
        Self {
            geometry: None,
            resources: None,
        }
    }
}

impl<R> SizedResources<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the resources must be rebuilt for `geometry`
    pub fn needs_update(&self, geometry: Geometry) -> bool {
        self.resources.is_none() || self.geometry != Some(geometry)
    }

    /// Resources for `geometry`, building them if absent or stale.
    ///
    /// The flag is `true` when `build` ran. If `build` fails nothing is kept.
    pub fn get_or_try_init<E, F>(&mut self, geometry: Geometry, build: F) -> Result<(&mut R, bool), E>
    where
        F: FnOnce(Geometry) -> Result<R, E>,
    {
        let fresh = self.needs_update(geometry);
        if fresh {
            // Drop the stale set before building so both never coexist
            self.invalidate();
        }
        let resources = match self.resources.take() {
            Some(resources) => resources,
            None => build(geometry)?,
        };
        self.geometry = Some(geometry);
        Ok((self.resources.insert(resources), fresh))
    }

    pub fn get(&self) -> Option<&R> {
        self.resources.as_ref()
    }

    pub fn geometry(&self) -> Option<Geometry> {
        self.geometry
    }

    pub fn invalidate(&mut self) {
        self.resources = None;
        self.geometry = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rebuilds_only_on_geometry_change() {
        let mut cache: SizedResources<u32> = SizedResources::new();
        let mut builds = 0;
        let steps = [
            (Geometry::new(4, 4), true),
            (Geometry::new(4, 4), false),
            (Geometry::new(8, 4), true),
        ];

        for (geometry, expect_fresh) in steps {
            let (value, fresh) = cache
                .get_or_try_init::<(), _>(geometry, |g| {
                    builds += 1;
                    Ok(g.width)
                })
                .unwrap();
            assert_eq!(*value, geometry.width);
            assert_eq!(fresh, expect_fresh);
        }
        assert_eq!(builds, 2);
        assert_eq!(cache.geometry(), Some(Geometry::new(8, 4)));
    }

    #[test]
    fn test_failed_build_keeps_nothing() {
        let mut cache: SizedResources<u32> = SizedResources::new();
        cache
            .get_or_try_init::<(), _>(Geometry::new(2, 2), |_| Ok(1))
            .unwrap();

        let result = cache.get_or_try_init(Geometry::new(3, 3), |_| Err("no memory"));
        assert!(result.is_err());
        assert!(cache.get().is_none());
        assert!(cache.needs_update(Geometry::new(2, 2)));
    }
}
