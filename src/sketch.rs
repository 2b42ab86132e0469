use std::fmt;

use sourmash::ScaledType;
use sourmash::encodings::HashFunctions;
use sourmash::signature::Signature;
use sourmash::sketch::Sketch;
use sourmash::sketch::minhash::KmerMinHash;

pub const DEFAULT_SEED: u64 = 42;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Molecule {
    Dna,
    Protein,
    Dayhoff,
    Hp,
}

impl Molecule {
    pub fn as_str(&self) -> &'static str {
        match self {
            Molecule::Dna => "dna",
            Molecule::Protein => "protein",
            Molecule::Dayhoff => "dayhoff",
            Molecule::Hp => "hp",
        }
    }

    pub fn hash_function(&self) -> HashFunctions {
        match self {
            Molecule::Dna => HashFunctions::Murmur64Dna,
            Molecule::Protein => HashFunctions::Murmur64Protein,
            Molecule::Dayhoff => HashFunctions::Murmur64Dayhoff,
            Molecule::Hp => HashFunctions::Murmur64Hp,
        }
    }

    pub fn default_ksize(&self) -> u32 {
        match self {
            Molecule::Dna => 31,
            Molecule::Protein => 10,
            Molecule::Dayhoff => 16,
            Molecule::Hp => 42,
        }
    }

    pub fn default_scaled(&self) -> ScaledType {
        match self {
            Molecule::Dna => 1000,
            _ => 200,
        }
    }

    pub fn is_protein_alphabet(&self) -> bool {
        !matches!(self, Molecule::Dna)
    }
}

impl fmt::Display for Molecule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How hashes are kept: everything below a threshold, or the `num` smallest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sampling {
    Scaled(ScaledType),
    Num(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SketchRecipe {
    pub molecule: Molecule,
    pub ksize: u32,
    pub sampling: Sampling,
    pub seed: u64,
    pub track_abundance: bool,
}

impl Default for SketchRecipe {
    fn default() -> Self {
        let molecule = Molecule::Dna;
        Self {
            molecule,
            ksize: molecule.default_ksize(),
            sampling: Sampling::Scaled(molecule.default_scaled()),
            seed: DEFAULT_SEED,
            track_abundance: false,
        }
    }
}

impl SketchRecipe {
    /// k-mer size as sourmash stores it: amino-acid sizes are counted in
    /// nucleotides.
    pub fn ksize_field(&self) -> u32 {
        if self.molecule.is_protein_alphabet() {
            self.ksize * 3
        } else {
            self.ksize
        }
    }

    pub fn minhash(&self) -> KmerMinHash {
        let (scaled, num) = match self.sampling {
            Sampling::Scaled(scaled) => (scaled, 0),
            Sampling::Num(num) => (0, num),
        };
        KmerMinHash::new(
            scaled,
            self.ksize_field(),
            self.molecule.hash_function(),
            self.seed,
            self.track_abundance,
            num,
        )
    }
}

/// Every sketch built from one parameter string for one accession, held in a
/// single unnamed signature until the accession is done.
#[derive(Debug, Clone)]
pub struct SketchSet {
    signature: Signature,
}

impl SketchSet {
    pub fn new(recipes: &[SketchRecipe]) -> Self {
        let mut signature = Signature::default();
        for recipe in recipes {
            signature.push(Sketch::MinHash(recipe.minhash()));
        }
        Self { signature }
    }

    /// Hashes every k-mer of `seq` into each sketch. With `force`, k-mers
    /// with non-ACGT bases are skipped instead of rejected.
    pub fn add_sequence(&mut self, seq: &[u8], force: bool) -> Result<(), sourmash::Error> {
        self.signature.add_sequence(seq, force)
    }

    pub fn set_name(&mut self, name: &str, filename: &str) {
        self.signature.set_name(name);
        self.signature.set_filename(filename);
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn len(&self) -> usize {
        self.signature.size()
    }

    pub fn is_empty(&self) -> bool {
        self.signature.size() == 0
    }

    /// One single-sketch signature per sketch, carrying the shared name and
    /// filename.
    pub fn split(&self) -> Vec<Signature> {
        self.signature
            .iter()
            .map(|sketch| {
                let mut single = self.signature.clone();
                single.reset_sketches();
                single.push(sketch.clone());
                single
            })
            .collect()
    }
}
