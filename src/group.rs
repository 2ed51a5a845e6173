//! Process groups.
//!
//! A [`Group`] is an ordered, immutable list of processes, identified by
//! their rank in the world communicator. Groups are obtained from a
//! [`Communicator`](crate::Communicator) or a [`Window`](crate::Window) and
//! are freed independently of the object that produced them.
//!
//! # Example
//!
//! ```
//! use ferrorma::{Group, GroupRelation, Universe};
//!
//! let universe = Universe::new(2).unwrap();
//! universe
//!     .run(|mpi| {
//!         let world = mpi.world();
//!         let mut a = world.group().unwrap();
//!         let mut b = a.incl(&[1, 0]).unwrap();
//!         assert_eq!(Group::compare(&a, &b).unwrap(), GroupRelation::Similar);
//!         a.free().unwrap();
//!         b.free().unwrap();
//!         assert!(a.is_null());
//!     })
//!     .unwrap();
//! ```

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};

/// Result of comparing two groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupRelation {
    /// Identical group members in identical order
    Identical,
    /// Identical group members in different order
    Similar,
    /// Otherwise
    Unequal,
}

/// An ordered set of processes.
///
/// [`Group::null()`] is `MPI_GROUP_NULL`; freeing a group turns it into the
/// null group.
#[derive(Clone)]
pub struct Group {
    /// World ranks of the members; `None` for `MPI_GROUP_NULL`.
    members: Option<Arc<[i32]>>,
    /// World rank of the process holding this handle, if known.
    me: Option<i32>,
    /// `MPI_GROUP_EMPTY`, which cannot be freed.
    predefined: bool,
}

impl Group {
    pub(crate) fn from_members(members: Arc<[i32]>, me: i32) -> Self {
        Group {
            members: Some(members),
            me: Some(me),
            predefined: false,
        }
    }

    /// `MPI_GROUP_NULL`.
    pub fn null() -> Self {
        Group {
            members: None,
            me: None,
            predefined: false,
        }
    }

    /// `MPI_GROUP_EMPTY`.
    pub fn empty() -> Self {
        Group {
            members: Some(Arc::from(Vec::<i32>::new())),
            me: None,
            predefined: true,
        }
    }

    /// Whether this is the null group.
    pub fn is_null(&self) -> bool {
        self.members.is_none()
    }

    fn members(&self) -> Result<&[i32]> {
        self.members
            .as_deref()
            .ok_or(Error::InvalidGroup("MPI_GROUP_NULL"))
    }

    /// Number of processes in the group.
    pub fn size(&self) -> Result<i32> {
        Ok(self.members()?.len() as i32)
    }

    /// Rank of the calling process in the group, or `None` if it is not a
    /// member (`MPI_UNDEFINED`).
    pub fn rank(&self) -> Result<Option<i32>> {
        let members = self.members()?;
        Ok(self
            .me
            .and_then(|me| members.iter().position(|&m| m == me))
            .map(|r| r as i32))
    }

    /// World ranks of the members, in group order.
    pub fn world_ranks(&self) -> Result<Vec<i32>> {
        Ok(self.members()?.to_vec())
    }

    /// Compare two groups.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidGroup`] if either group is null.
    pub fn compare(a: &Group, b: &Group) -> Result<GroupRelation> {
        let (a, b) = (a.members()?, b.members()?);
        if a == b {
            return Ok(GroupRelation::Identical);
        }
        if a.len() == b.len() {
            let set: HashSet<i32> = a.iter().copied().collect();
            if b.iter().all(|m| set.contains(m)) {
                return Ok(GroupRelation::Similar);
            }
        }
        Ok(GroupRelation::Unequal)
    }

    /// Translate ranks in this group to ranks in `other`.
    ///
    /// Processes that are not members of `other` map to `None`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRank`] for a rank outside this group.
    pub fn translate_ranks(&self, ranks: &[i32], other: &Group) -> Result<Vec<Option<i32>>> {
        let (mine, theirs) = (self.members()?, other.members()?);
        ranks
            .iter()
            .map(|&r| {
                let world = self.member(mine, r)?;
                Ok(theirs.iter().position(|&m| m == world).map(|p| p as i32))
            })
            .collect()
    }

    /// New group made of the listed ranks of this group, in the given order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRank`] for an out-of-range or repeated rank.
    pub fn incl(&self, ranks: &[i32]) -> Result<Group> {
        let members = self.members()?;
        let mut seen = HashSet::new();
        let picked = ranks
            .iter()
            .map(|&r| {
                if !seen.insert(r) {
                    return Err(Error::InvalidRank(r));
                }
                self.member(members, r)
            })
            .collect::<Result<Vec<i32>>>()?;
        Ok(Group {
            members: Some(Arc::from(picked)),
            me: self.me,
            predefined: false,
        })
    }

    /// New group without the listed ranks of this group, order preserved.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRank`] for an out-of-range or repeated rank.
    pub fn excl(&self, ranks: &[i32]) -> Result<Group> {
        let members = self.members()?;
        let mut dropped = HashSet::new();
        for &r in ranks {
            self.member(members, r)?;
            if !dropped.insert(r as usize) {
                return Err(Error::InvalidRank(r));
            }
        }
        let kept: Vec<i32> = members
            .iter()
            .enumerate()
            .filter(|(i, _)| !dropped.contains(i))
            .map(|(_, &m)| m)
            .collect();
        Ok(Group {
            members: Some(Arc::from(kept)),
            me: self.me,
            predefined: false,
        })
    }

    fn member(&self, members: &[i32], rank: i32) -> Result<i32> {
        usize::try_from(rank)
            .ok()
            .and_then(|r| members.get(r).copied())
            .ok_or(Error::InvalidRank(rank))
    }

    /// Free the group, turning this handle into `MPI_GROUP_NULL`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidGroup`] if the group is already null or is
    /// `MPI_GROUP_EMPTY`.
    pub fn free(&mut self) -> Result<()> {
        if self.predefined {
            return Err(Error::InvalidGroup("cannot free MPI_GROUP_EMPTY"));
        }
        if self.members.take().is_none() {
            return Err(Error::InvalidGroup("cannot free MPI_GROUP_NULL"));
        }
        Ok(())
    }
}

impl fmt::Debug for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.members {
            None => f.write_str("MPI_GROUP_NULL"),
            Some(members) => f.debug_tuple("Group").field(&&members[..]).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorClass;

    fn group(members: &[i32], me: i32) -> Group {
        Group::from_members(Arc::from(members.to_vec()), me)
    }

    #[test]
    fn compare_relations() {
        let a = group(&[0, 1, 2], 0);
        assert_eq!(
            Group::compare(&a, &group(&[0, 1, 2], 1)).unwrap(),
            GroupRelation::Identical
        );
        assert_eq!(
            Group::compare(&a, &group(&[2, 0, 1], 0)).unwrap(),
            GroupRelation::Similar
        );
        assert_eq!(
            Group::compare(&a, &group(&[0, 1], 0)).unwrap(),
            GroupRelation::Unequal
        );
        assert_eq!(
            Group::compare(&a, &group(&[0, 1, 3], 0)).unwrap(),
            GroupRelation::Unequal
        );
        assert_eq!(
            Group::compare(&Group::empty(), &Group::empty()).unwrap(),
            GroupRelation::Identical
        );
    }

    #[test]
    fn compare_null_is_err_group() {
        let err = Group::compare(&Group::null(), &Group::empty()).unwrap_err();
        assert_eq!(err.class(), ErrorClass::Group);
    }

    #[test]
    fn rank_and_size() {
        let g = group(&[4, 2, 7], 2);
        assert_eq!(g.size().unwrap(), 3);
        assert_eq!(g.rank().unwrap(), Some(1));
        assert_eq!(group(&[4, 7], 2).rank().unwrap(), None);
        assert_eq!(Group::empty().rank().unwrap(), None);
    }

    #[test]
    fn incl_and_excl() {
        let g = group(&[0, 1, 2, 3], 1);
        let picked = g.incl(&[3, 1]).unwrap();
        assert_eq!(picked.world_ranks().unwrap(), vec![3, 1]);
        assert_eq!(picked.rank().unwrap(), Some(1));
        let rest = g.excl(&[0, 2]).unwrap();
        assert_eq!(rest.world_ranks().unwrap(), vec![1, 3]);
        assert_eq!(g.incl(&[1, 1]).unwrap_err(), Error::InvalidRank(1));
        assert_eq!(g.incl(&[4]).unwrap_err(), Error::InvalidRank(4));
        assert_eq!(g.excl(&[-1]).unwrap_err(), Error::InvalidRank(-1));
        assert_eq!(g.excl(&[2, 2]).unwrap_err(), Error::InvalidRank(2));
    }

    #[test]
    fn translate() {
        let a = group(&[5, 6, 7], 5);
        let b = group(&[7, 5], 5);
        assert_eq!(
            a.translate_ranks(&[0, 1, 2], &b).unwrap(),
            vec![Some(1), None, Some(0)]
        );
        assert!(a.translate_ranks(&[3], &b).is_err());
    }

    #[test]
    fn free_transitions_to_null() {
        let mut g = group(&[0], 0);
        let copy = g.clone();
        g.free().unwrap();
        assert!(g.is_null());
        assert_eq!(format!("{g:?}"), "MPI_GROUP_NULL");
        assert_eq!(g.free().unwrap_err().class(), ErrorClass::Group);
        assert_eq!(g.size().unwrap_err().class(), ErrorClass::Group);
        assert_eq!(copy.size().unwrap(), 1);
    }

    #[test]
    fn predefined_empty_group_cannot_be_freed() {
        let mut empty = Group::empty();
        assert_eq!(empty.free().unwrap_err().class(), ErrorClass::Group);
        assert!(!empty.is_null());
        assert_eq!(empty.size().unwrap(), 0);

        let mut derived = group(&[3], 3).excl(&[0]).unwrap();
        assert_eq!(derived.size().unwrap(), 0);
        derived.free().unwrap();
        assert!(derived.is_null());
    }
}
