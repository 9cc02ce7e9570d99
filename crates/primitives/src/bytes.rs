// Copyright 2024 Onyx Foundation. All rights reserved.
// Onyx is free software and distributed under GNU General Public License.
// See http://www.gnu.org/licenses/

//! General byte-vector alias used across consensus types.

pub type Bytes = Vec<u8>;
