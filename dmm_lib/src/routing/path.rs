use common::{Link, SwitchId};

use super::RoutingResult;
use crate::error::{RouteResult, RoutingError};

/// Ordered links from `src` to `dst`. Empty when both ends are the same switch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Path {
    pub src: SwitchId,
    pub dst: SwitchId,
    pub links: Vec<Link>,
}

impl Path {
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Sum of link weights along the path.
    pub fn cost(&self) -> u64 {
        self.links.iter().map(|l| u64::from(l.weight)).sum()
    }
}

/// Walks the previous-hop links back from `dst` to `src`.
pub fn extract_path(result: &RoutingResult, src: SwitchId, dst: SwitchId) -> RouteResult<Path> {
    let tree = result.tree(src).ok_or(RoutingError::UnknownSwitch(src))?;
    let not_found = RoutingError::RouteNotFound { src, dst };
    if !tree.distance.contains_key(&dst) {
        return Err(not_found);
    }

    let mut links = Vec::new();
    let mut current = dst;
    while current != src {
        let link = tree.previous.get(&current).ok_or_else(|| not_found.clone())?;
        links.push(*link);
        current = link.src;
        if links.len() > tree.previous.len() {
            return Err(not_found);
        }
    }
    links.reverse();
    Ok(Path { src, dst, links })
}
