//! Built-in signatures of the core JDK classes.
//!
//! Compiling against `java.lang.String` should not require a JDK on disk,
//! so the most used classes of `java.lang`, `java.io` and `java.util` are
//! described here in a line-oriented table and parsed once on first use.
//!
//! ```text
//! class <flags> <name> <super|-> [<interface>,...]
//!   m <flags> <name> <descriptor> [throws <class>,...]
//!   f <flags> <name> <descriptor> [= <value>]
//!   inner <inner> <outer> <simple-name> <flags>
//! ```

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::codegen::defs::access_flags::*;
use crate::common::descriptor::{parse_field_descriptor, DescType};
use crate::common::model::{BinaryClass, BinaryField, BinaryMethod, ConstValue, InnerClassEntry};
use crate::common::types::PrimitiveType;

const TABLE: &str = r#"
class public java/lang/Object -
  m public <init> ()V
  m public,final,native getClass ()Ljava/lang/Class;
  m public,native hashCode ()I
  m public equals (Ljava/lang/Object;)Z
  m protected,native clone ()Ljava/lang/Object; throws java/lang/CloneNotSupportedException
  m public toString ()Ljava/lang/String;
  m public,final,native notify ()V
  m public,final,native notifyAll ()V
  m public,final wait ()V throws java/lang/InterruptedException
  m public,final,native wait (J)V throws java/lang/InterruptedException
  m protected finalize ()V throws java/lang/Throwable

class public,interface java/io/Serializable java/lang/Object
class public,interface java/lang/Cloneable java/lang/Object
class public,interface java/util/RandomAccess java/lang/Object

class public,interface java/lang/Comparable java/lang/Object
  m public,abstract compareTo (Ljava/lang/Object;)I

class public,interface java/lang/CharSequence java/lang/Object
  m public,abstract length ()I
  m public,abstract charAt (I)C
  m public,abstract subSequence (II)Ljava/lang/CharSequence;
  m public,abstract toString ()Ljava/lang/String;

class public,interface java/lang/Runnable java/lang/Object
  m public,abstract run ()V

class public,interface java/lang/AutoCloseable java/lang/Object
  m public,abstract close ()V throws java/lang/Exception

class public,interface java/lang/Iterable java/lang/Object
  m public,abstract iterator ()Ljava/util/Iterator;

class public,final java/lang/String java/lang/Object java/io/Serializable,java/lang/Comparable,java/lang/CharSequence
  m public <init> ()V
  m public <init> (Ljava/lang/String;)V
  m public <init> ([C)V
  m public <init> ([CII)V
  m public <init> ([B)V
  m public length ()I
  m public isEmpty ()Z
  m public charAt (I)C
  m public equals (Ljava/lang/Object;)Z
  m public equalsIgnoreCase (Ljava/lang/String;)Z
  m public compareTo (Ljava/lang/String;)I
  m public hashCode ()I
  m public indexOf (I)I
  m public indexOf (II)I
  m public indexOf (Ljava/lang/String;)I
  m public indexOf (Ljava/lang/String;I)I
  m public lastIndexOf (I)I
  m public lastIndexOf (Ljava/lang/String;)I
  m public substring (I)Ljava/lang/String;
  m public substring (II)Ljava/lang/String;
  m public subSequence (II)Ljava/lang/CharSequence;
  m public concat (Ljava/lang/String;)Ljava/lang/String;
  m public replace (CC)Ljava/lang/String;
  m public replace (Ljava/lang/CharSequence;Ljava/lang/CharSequence;)Ljava/lang/String;
  m public contains (Ljava/lang/CharSequence;)Z
  m public startsWith (Ljava/lang/String;)Z
  m public endsWith (Ljava/lang/String;)Z
  m public toLowerCase ()Ljava/lang/String;
  m public toUpperCase ()Ljava/lang/String;
  m public trim ()Ljava/lang/String;
  m public toCharArray ()[C
  m public getBytes ()[B
  m public split (Ljava/lang/String;)[Ljava/lang/String;
  m public matches (Ljava/lang/String;)Z
  m public intern ()Ljava/lang/String;
  m public toString ()Ljava/lang/String;
  m public,static valueOf (Ljava/lang/Object;)Ljava/lang/String;
  m public,static valueOf ([C)Ljava/lang/String;
  m public,static valueOf (Z)Ljava/lang/String;
  m public,static valueOf (C)Ljava/lang/String;
  m public,static valueOf (I)Ljava/lang/String;
  m public,static valueOf (J)Ljava/lang/String;
  m public,static valueOf (F)Ljava/lang/String;
  m public,static valueOf (D)Ljava/lang/String;
  m public,static,varargs format (Ljava/lang/String;[Ljava/lang/Object;)Ljava/lang/String;
  m public,static,varargs join (Ljava/lang/CharSequence;[Ljava/lang/CharSequence;)Ljava/lang/String;

class public,final java/lang/StringBuilder java/lang/Object java/io/Serializable,java/lang/CharSequence
  m public <init> ()V
  m public <init> (I)V
  m public <init> (Ljava/lang/String;)V
  m public append (Ljava/lang/Object;)Ljava/lang/StringBuilder;
  m public append (Ljava/lang/String;)Ljava/lang/StringBuilder;
  m public append (Ljava/lang/CharSequence;)Ljava/lang/StringBuilder;
  m public append ([C)Ljava/lang/StringBuilder;
  m public append (Z)Ljava/lang/StringBuilder;
  m public append (C)Ljava/lang/StringBuilder;
  m public append (I)Ljava/lang/StringBuilder;
  m public append (J)Ljava/lang/StringBuilder;
  m public append (F)Ljava/lang/StringBuilder;
  m public append (D)Ljava/lang/StringBuilder;
  m public insert (ILjava/lang/String;)Ljava/lang/StringBuilder;
  m public reverse ()Ljava/lang/StringBuilder;
  m public deleteCharAt (I)Ljava/lang/StringBuilder;
  m public setLength (I)V
  m public length ()I
  m public charAt (I)C
  m public subSequence (II)Ljava/lang/CharSequence;
  m public toString ()Ljava/lang/String;

class public,abstract java/lang/Number java/lang/Object java/io/Serializable
  m public <init> ()V
  m public,abstract intValue ()I
  m public,abstract longValue ()J
  m public,abstract floatValue ()F
  m public,abstract doubleValue ()D
  m public byteValue ()B
  m public shortValue ()S

class public,final java/lang/Integer java/lang/Number java/lang/Comparable
  f public,static,final MIN_VALUE I = -2147483648
  f public,static,final MAX_VALUE I = 2147483647
  f public,static,final SIZE I = 32
  f public,static,final TYPE Ljava/lang/Class;
  m public <init> (I)V
  m public,static valueOf (I)Ljava/lang/Integer;
  m public,static valueOf (Ljava/lang/String;)Ljava/lang/Integer; throws java/lang/NumberFormatException
  m public,static parseInt (Ljava/lang/String;)I throws java/lang/NumberFormatException
  m public,static parseInt (Ljava/lang/String;I)I throws java/lang/NumberFormatException
  m public,static toString (I)Ljava/lang/String;
  m public,static toHexString (I)Ljava/lang/String;
  m public,static toBinaryString (I)Ljava/lang/String;
  m public,static compare (II)I
  m public,static max (II)I
  m public,static min (II)I
  m public,static sum (II)I
  m public,static bitCount (I)I
  m public intValue ()I
  m public longValue ()J
  m public floatValue ()F
  m public doubleValue ()D
  m public byteValue ()B
  m public shortValue ()S
  m public compareTo (Ljava/lang/Integer;)I
  m public equals (Ljava/lang/Object;)Z
  m public hashCode ()I
  m public toString ()Ljava/lang/String;

class public,final java/lang/Long java/lang/Number java/lang/Comparable
  f public,static,final MIN_VALUE J = -9223372036854775808
  f public,static,final MAX_VALUE J = 9223372036854775807
  f public,static,final TYPE Ljava/lang/Class;
  m public <init> (J)V
  m public,static valueOf (J)Ljava/lang/Long;
  m public,static valueOf (Ljava/lang/String;)Ljava/lang/Long; throws java/lang/NumberFormatException
  m public,static parseLong (Ljava/lang/String;)J throws java/lang/NumberFormatException
  m public,static toString (J)Ljava/lang/String;
  m public,static toHexString (J)Ljava/lang/String;
  m public,static compare (JJ)I
  m public,static max (JJ)J
  m public,static min (JJ)J
  m public intValue ()I
  m public longValue ()J
  m public floatValue ()F
  m public doubleValue ()D
  m public compareTo (Ljava/lang/Long;)I
  m public equals (Ljava/lang/Object;)Z
  m public hashCode ()I
  m public toString ()Ljava/lang/String;

class public,final java/lang/Short java/lang/Number java/lang/Comparable
  f public,static,final MIN_VALUE S = -32768
  f public,static,final MAX_VALUE S = 32767
  f public,static,final TYPE Ljava/lang/Class;
  m public <init> (S)V
  m public,static valueOf (S)Ljava/lang/Short;
  m public,static parseShort (Ljava/lang/String;)S throws java/lang/NumberFormatException
  m public,static toString (S)Ljava/lang/String;
  m public shortValue ()S
  m public intValue ()I
  m public longValue ()J
  m public floatValue ()F
  m public doubleValue ()D
  m public equals (Ljava/lang/Object;)Z
  m public hashCode ()I
  m public toString ()Ljava/lang/String;

class public,final java/lang/Byte java/lang/Number java/lang/Comparable
  f public,static,final MIN_VALUE B = -128
  f public,static,final MAX_VALUE B = 127
  f public,static,final TYPE Ljava/lang/Class;
  m public <init> (B)V
  m public,static valueOf (B)Ljava/lang/Byte;
  m public,static parseByte (Ljava/lang/String;)B throws java/lang/NumberFormatException
  m public,static toString (B)Ljava/lang/String;
  m public byteValue ()B
  m public intValue ()I
  m public longValue ()J
  m public floatValue ()F
  m public doubleValue ()D
  m public equals (Ljava/lang/Object;)Z
  m public hashCode ()I
  m public toString ()Ljava/lang/String;

class public,final java/lang/Character java/lang/Object java/io/Serializable,java/lang/Comparable
  f public,static,final MIN_VALUE C = 0
  f public,static,final MAX_VALUE C = 65535
  f public,static,final TYPE Ljava/lang/Class;
  m public <init> (C)V
  m public,static valueOf (C)Ljava/lang/Character;
  m public,static isDigit (C)Z
  m public,static isLetter (C)Z
  m public,static isLetterOrDigit (C)Z
  m public,static isWhitespace (C)Z
  m public,static isUpperCase (C)Z
  m public,static isLowerCase (C)Z
  m public,static toUpperCase (C)C
  m public,static toLowerCase (C)C
  m public,static getNumericValue (C)I
  m public,static toString (C)Ljava/lang/String;
  m public charValue ()C
  m public compareTo (Ljava/lang/Character;)I
  m public equals (Ljava/lang/Object;)Z
  m public hashCode ()I
  m public toString ()Ljava/lang/String;

class public,final java/lang/Boolean java/lang/Object java/io/Serializable,java/lang/Comparable
  f public,static,final TRUE Ljava/lang/Boolean;
  f public,static,final FALSE Ljava/lang/Boolean;
  f public,static,final TYPE Ljava/lang/Class;
  m public <init> (Z)V
  m public,static valueOf (Z)Ljava/lang/Boolean;
  m public,static valueOf (Ljava/lang/String;)Ljava/lang/Boolean;
  m public,static parseBoolean (Ljava/lang/String;)Z
  m public,static toString (Z)Ljava/lang/String;
  m public booleanValue ()Z
  m public equals (Ljava/lang/Object;)Z
  m public hashCode ()I
  m public toString ()Ljava/lang/String;

class public,final java/lang/Float java/lang/Number java/lang/Comparable
  f public,static,final MAX_VALUE F = 3.4028235e38
  f public,static,final MIN_VALUE F = 1.4e-45
  f public,static,final NaN F = NaN
  f public,static,final POSITIVE_INFINITY F = inf
  f public,static,final NEGATIVE_INFINITY F = -inf
  f public,static,final TYPE Ljava/lang/Class;
  m public <init> (F)V
  m public,static valueOf (F)Ljava/lang/Float;
  m public,static parseFloat (Ljava/lang/String;)F throws java/lang/NumberFormatException
  m public,static isNaN (F)Z
  m public,static toString (F)Ljava/lang/String;
  m public,static compare (FF)I
  m public floatValue ()F
  m public intValue ()I
  m public longValue ()J
  m public doubleValue ()D
  m public isNaN ()Z
  m public equals (Ljava/lang/Object;)Z
  m public hashCode ()I
  m public toString ()Ljava/lang/String;

class public,final java/lang/Double java/lang/Number java/lang/Comparable
  f public,static,final MAX_VALUE D = 1.7976931348623157e308
  f public,static,final MIN_VALUE D = 4.9e-324
  f public,static,final NaN D = NaN
  f public,static,final POSITIVE_INFINITY D = inf
  f public,static,final NEGATIVE_INFINITY D = -inf
  f public,static,final TYPE Ljava/lang/Class;
  m public <init> (D)V
  m public,static valueOf (D)Ljava/lang/Double;
  m public,static parseDouble (Ljava/lang/String;)D throws java/lang/NumberFormatException
  m public,static isNaN (D)Z
  m public,static isInfinite (D)Z
  m public,static toString (D)Ljava/lang/String;
  m public,static compare (DD)I
  m public doubleValue ()D
  m public intValue ()I
  m public longValue ()J
  m public floatValue ()F
  m public isNaN ()Z
  m public equals (Ljava/lang/Object;)Z
  m public hashCode ()I
  m public toString ()Ljava/lang/String;

class public,final java/lang/Void java/lang/Object
  f public,static,final TYPE Ljava/lang/Class;

class public,final java/lang/Math java/lang/Object
  f public,static,final PI D = 3.141592653589793
  f public,static,final E D = 2.718281828459045
  m public,static abs (I)I
  m public,static abs (J)J
  m public,static abs (F)F
  m public,static abs (D)D
  m public,static max (II)I
  m public,static max (JJ)J
  m public,static max (FF)F
  m public,static max (DD)D
  m public,static min (II)I
  m public,static min (JJ)J
  m public,static min (FF)F
  m public,static min (DD)D
  m public,static sqrt (D)D
  m public,static cbrt (D)D
  m public,static pow (DD)D
  m public,static exp (D)D
  m public,static log (D)D
  m public,static log10 (D)D
  m public,static sin (D)D
  m public,static cos (D)D
  m public,static tan (D)D
  m public,static atan2 (DD)D
  m public,static hypot (DD)D
  m public,static floor (D)D
  m public,static ceil (D)D
  m public,static signum (D)D
  m public,static round (D)J
  m public,static round (F)I
  m public,static random ()D
  m public,static floorDiv (II)I
  m public,static floorMod (II)I
  m public,static addExact (II)I
  m public,static multiplyExact (II)I

class public,final java/lang/System java/lang/Object
  f public,static,final in Ljava/io/InputStream;
  f public,static,final out Ljava/io/PrintStream;
  f public,static,final err Ljava/io/PrintStream;
  m public,static,native currentTimeMillis ()J
  m public,static,native nanoTime ()J
  m public,static,native arraycopy (Ljava/lang/Object;ILjava/lang/Object;II)V
  m public,static,native identityHashCode (Ljava/lang/Object;)I
  m public,static exit (I)V
  m public,static getProperty (Ljava/lang/String;)Ljava/lang/String;
  m public,static lineSeparator ()Ljava/lang/String;

class public,final java/lang/Class java/lang/Object java/io/Serializable
  m public getName ()Ljava/lang/String;
  m public getSimpleName ()Ljava/lang/String;
  m public getSuperclass ()Ljava/lang/Class;
  m public,native isInstance (Ljava/lang/Object;)Z
  m public,native isArray ()Z
  m public,native isInterface ()Z
  m public,native isPrimitive ()Z
  m public toString ()Ljava/lang/String;

class public java/lang/Thread java/lang/Object java/lang/Runnable
  m public <init> ()V
  m public <init> (Ljava/lang/Runnable;)V
  m public start ()V
  m public run ()V
  m public,final join ()V throws java/lang/InterruptedException
  m public,final getName ()Ljava/lang/String;
  m public,static,native currentThread ()Ljava/lang/Thread;
  m public,static,native sleep (J)V throws java/lang/InterruptedException

class public,abstract java/io/InputStream java/lang/Object java/lang/AutoCloseable
  m public <init> ()V
  m public,abstract read ()I throws java/io/IOException
  m public close ()V throws java/io/IOException

class public java/io/PrintStream java/lang/Object java/lang/AutoCloseable
  m public println ()V
  m public println (Z)V
  m public println (C)V
  m public println (I)V
  m public println (J)V
  m public println (F)V
  m public println (D)V
  m public println ([C)V
  m public println (Ljava/lang/String;)V
  m public println (Ljava/lang/Object;)V
  m public print (Z)V
  m public print (C)V
  m public print (I)V
  m public print (J)V
  m public print (F)V
  m public print (D)V
  m public print ([C)V
  m public print (Ljava/lang/String;)V
  m public print (Ljava/lang/Object;)V
  m public,varargs printf (Ljava/lang/String;[Ljava/lang/Object;)Ljava/io/PrintStream;
  m public flush ()V
  m public close ()V

class public java/lang/Throwable java/lang/Object java/io/Serializable
  m public <init> ()V
  m public <init> (Ljava/lang/String;)V
  m public <init> (Ljava/lang/String;Ljava/lang/Throwable;)V
  m public <init> (Ljava/lang/Throwable;)V
  m public getMessage ()Ljava/lang/String;
  m public getLocalizedMessage ()Ljava/lang/String;
  m public getCause ()Ljava/lang/Throwable;
  m public initCause (Ljava/lang/Throwable;)Ljava/lang/Throwable;
  m public,final addSuppressed (Ljava/lang/Throwable;)V
  m public printStackTrace ()V
  m public toString ()Ljava/lang/String;

class public java/lang/Exception java/lang/Throwable
  m public <init> ()V
  m public <init> (Ljava/lang/String;)V
  m public <init> (Ljava/lang/String;Ljava/lang/Throwable;)V
  m public <init> (Ljava/lang/Throwable;)V

class public java/lang/Error java/lang/Throwable
  m public <init> ()V
  m public <init> (Ljava/lang/String;)V
  m public <init> (Ljava/lang/String;Ljava/lang/Throwable;)V
  m public <init> (Ljava/lang/Throwable;)V

class public java/lang/RuntimeException java/lang/Exception
  m public <init> ()V
  m public <init> (Ljava/lang/String;)V
  m public <init> (Ljava/lang/String;Ljava/lang/Throwable;)V
  m public <init> (Ljava/lang/Throwable;)V

class public java/lang/AssertionError java/lang/Error
  m public <init> ()V
  m public <init> (Ljava/lang/Object;)V
  m public <init> (Z)V
  m public <init> (C)V
  m public <init> (I)V
  m public <init> (J)V
  m public <init> (F)V
  m public <init> (D)V

class public java/lang/IllegalArgumentException java/lang/RuntimeException
  m public <init> ()V
  m public <init> (Ljava/lang/String;)V
  m public <init> (Ljava/lang/String;Ljava/lang/Throwable;)V
  m public <init> (Ljava/lang/Throwable;)V

class public java/lang/IllegalStateException java/lang/RuntimeException
  m public <init> ()V
  m public <init> (Ljava/lang/String;)V
  m public <init> (Ljava/lang/String;Ljava/lang/Throwable;)V
  m public <init> (Ljava/lang/Throwable;)V

class public java/lang/NumberFormatException java/lang/IllegalArgumentException
  m public <init> ()V
  m public <init> (Ljava/lang/String;)V

class public java/lang/ArithmeticException java/lang/RuntimeException
  m public <init> ()V
  m public <init> (Ljava/lang/String;)V

class public java/lang/NullPointerException java/lang/RuntimeException
  m public <init> ()V
  m public <init> (Ljava/lang/String;)V

class public java/lang/ClassCastException java/lang/RuntimeException
  m public <init> ()V
  m public <init> (Ljava/lang/String;)V

class public java/lang/NegativeArraySizeException java/lang/RuntimeException
  m public <init> ()V
  m public <init> (Ljava/lang/String;)V

class public java/lang/ArrayStoreException java/lang/RuntimeException
  m public <init> ()V
  m public <init> (Ljava/lang/String;)V

class public java/lang/IndexOutOfBoundsException java/lang/RuntimeException
  m public <init> ()V
  m public <init> (Ljava/lang/String;)V
  m public <init> (I)V

class public java/lang/ArrayIndexOutOfBoundsException java/lang/IndexOutOfBoundsException
  m public <init> ()V
  m public <init> (Ljava/lang/String;)V
  m public <init> (I)V

class public java/lang/StringIndexOutOfBoundsException java/lang/IndexOutOfBoundsException
  m public <init> ()V
  m public <init> (Ljava/lang/String;)V
  m public <init> (I)V

class public java/lang/UnsupportedOperationException java/lang/RuntimeException
  m public <init> ()V
  m public <init> (Ljava/lang/String;)V
  m public <init> (Ljava/lang/String;Ljava/lang/Throwable;)V

class public java/lang/InterruptedException java/lang/Exception
  m public <init> ()V
  m public <init> (Ljava/lang/String;)V

class public java/lang/CloneNotSupportedException java/lang/Exception
  m public <init> ()V
  m public <init> (Ljava/lang/String;)V

class public java/lang/ClassNotFoundException java/lang/Exception
  m public <init> ()V
  m public <init> (Ljava/lang/String;)V

class public java/io/IOException java/lang/Exception
  m public <init> ()V
  m public <init> (Ljava/lang/String;)V
  m public <init> (Ljava/lang/String;Ljava/lang/Throwable;)V
  m public <init> (Ljava/lang/Throwable;)V

class public java/io/FileNotFoundException java/io/IOException
  m public <init> ()V
  m public <init> (Ljava/lang/String;)V

class public java/util/NoSuchElementException java/lang/RuntimeException
  m public <init> ()V
  m public <init> (Ljava/lang/String;)V

class public java/util/ConcurrentModificationException java/lang/RuntimeException
  m public <init> ()V
  m public <init> (Ljava/lang/String;)V

class public,interface java/util/Iterator java/lang/Object
  m public,abstract hasNext ()Z
  m public,abstract next ()Ljava/lang/Object;
  m public remove ()V

class public,interface java/util/Comparator java/lang/Object
  m public,abstract compare (Ljava/lang/Object;Ljava/lang/Object;)I

class public,interface java/util/Collection java/lang/Object java/lang/Iterable
  m public,abstract size ()I
  m public,abstract isEmpty ()Z
  m public,abstract contains (Ljava/lang/Object;)Z
  m public,abstract add (Ljava/lang/Object;)Z
  m public,abstract remove (Ljava/lang/Object;)Z
  m public,abstract addAll (Ljava/util/Collection;)Z
  m public,abstract clear ()V
  m public,abstract iterator ()Ljava/util/Iterator;
  m public,abstract toArray ()[Ljava/lang/Object;

class public,interface java/util/List java/lang/Object java/util/Collection
  m public,abstract get (I)Ljava/lang/Object;
  m public,abstract set (ILjava/lang/Object;)Ljava/lang/Object;
  m public,abstract add (ILjava/lang/Object;)V
  m public,abstract remove (I)Ljava/lang/Object;
  m public,abstract indexOf (Ljava/lang/Object;)I
  m public,abstract subList (II)Ljava/util/List;

class public,interface java/util/Set java/lang/Object java/util/Collection

class public,interface java/util/Map java/lang/Object
  inner java/util/Map$Entry java/util/Map Entry public,static,interface
  m public,abstract size ()I
  m public,abstract isEmpty ()Z
  m public,abstract get (Ljava/lang/Object;)Ljava/lang/Object;
  m public,abstract put (Ljava/lang/Object;Ljava/lang/Object;)Ljava/lang/Object;
  m public,abstract remove (Ljava/lang/Object;)Ljava/lang/Object;
  m public,abstract containsKey (Ljava/lang/Object;)Z
  m public,abstract containsValue (Ljava/lang/Object;)Z
  m public,abstract keySet ()Ljava/util/Set;
  m public,abstract values ()Ljava/util/Collection;
  m public,abstract entrySet ()Ljava/util/Set;
  m public,abstract clear ()V
  m public getOrDefault (Ljava/lang/Object;Ljava/lang/Object;)Ljava/lang/Object;

class public,interface java/util/Map$Entry java/lang/Object
  inner java/util/Map$Entry java/util/Map Entry public,static,interface
  m public,abstract getKey ()Ljava/lang/Object;
  m public,abstract getValue ()Ljava/lang/Object;
  m public,abstract setValue (Ljava/lang/Object;)Ljava/lang/Object;

class public java/util/ArrayList java/lang/Object java/util/List,java/util/RandomAccess,java/lang/Cloneable,java/io/Serializable
  m public <init> ()V
  m public <init> (I)V
  m public <init> (Ljava/util/Collection;)V
  m public size ()I
  m public isEmpty ()Z
  m public contains (Ljava/lang/Object;)Z
  m public indexOf (Ljava/lang/Object;)I
  m public get (I)Ljava/lang/Object;
  m public set (ILjava/lang/Object;)Ljava/lang/Object;
  m public add (Ljava/lang/Object;)Z
  m public add (ILjava/lang/Object;)V
  m public remove (I)Ljava/lang/Object;
  m public remove (Ljava/lang/Object;)Z
  m public addAll (Ljava/util/Collection;)Z
  m public clear ()V
  m public iterator ()Ljava/util/Iterator;
  m public toArray ()[Ljava/lang/Object;
  m public subList (II)Ljava/util/List;
  m public equals (Ljava/lang/Object;)Z
  m public hashCode ()I
  m public toString ()Ljava/lang/String;

class public java/util/LinkedList java/lang/Object java/util/List,java/lang/Cloneable,java/io/Serializable
  m public <init> ()V
  m public size ()I
  m public isEmpty ()Z
  m public contains (Ljava/lang/Object;)Z
  m public indexOf (Ljava/lang/Object;)I
  m public get (I)Ljava/lang/Object;
  m public set (ILjava/lang/Object;)Ljava/lang/Object;
  m public add (Ljava/lang/Object;)Z
  m public add (ILjava/lang/Object;)V
  m public remove (I)Ljava/lang/Object;
  m public remove (Ljava/lang/Object;)Z
  m public addAll (Ljava/util/Collection;)Z
  m public addFirst (Ljava/lang/Object;)V
  m public removeFirst ()Ljava/lang/Object;
  m public clear ()V
  m public iterator ()Ljava/util/Iterator;
  m public toArray ()[Ljava/lang/Object;
  m public subList (II)Ljava/util/List;
  m public toString ()Ljava/lang/String;

class public java/util/HashMap java/lang/Object java/util/Map,java/lang/Cloneable,java/io/Serializable
  m public <init> ()V
  m public <init> (I)V
  m public size ()I
  m public isEmpty ()Z
  m public get (Ljava/lang/Object;)Ljava/lang/Object;
  m public put (Ljava/lang/Object;Ljava/lang/Object;)Ljava/lang/Object;
  m public remove (Ljava/lang/Object;)Ljava/lang/Object;
  m public containsKey (Ljava/lang/Object;)Z
  m public containsValue (Ljava/lang/Object;)Z
  m public keySet ()Ljava/util/Set;
  m public values ()Ljava/util/Collection;
  m public entrySet ()Ljava/util/Set;
  m public clear ()V
  m public getOrDefault (Ljava/lang/Object;Ljava/lang/Object;)Ljava/lang/Object;
  m public toString ()Ljava/lang/String;

class public java/util/HashSet java/lang/Object java/util/Set,java/lang/Cloneable,java/io/Serializable
  m public <init> ()V
  m public <init> (Ljava/util/Collection;)V
  m public size ()I
  m public isEmpty ()Z
  m public contains (Ljava/lang/Object;)Z
  m public add (Ljava/lang/Object;)Z
  m public remove (Ljava/lang/Object;)Z
  m public addAll (Ljava/util/Collection;)Z
  m public clear ()V
  m public iterator ()Ljava/util/Iterator;
  m public toArray ()[Ljava/lang/Object;
  m public toString ()Ljava/lang/String;

class public java/util/Arrays java/lang/Object
  m public,static toString ([I)Ljava/lang/String;
  m public,static toString ([J)Ljava/lang/String;
  m public,static toString ([D)Ljava/lang/String;
  m public,static toString ([C)Ljava/lang/String;
  m public,static toString ([Ljava/lang/Object;)Ljava/lang/String;
  m public,static sort ([I)V
  m public,static sort ([Ljava/lang/Object;)V
  m public,static fill ([II)V
  m public,static equals ([I[I)Z
  m public,static copyOf ([II)[I
  m public,static,varargs asList ([Ljava/lang/Object;)Ljava/util/List;

class public,final java/util/Objects java/lang/Object
  m public,static equals (Ljava/lang/Object;Ljava/lang/Object;)Z
  m public,static hashCode (Ljava/lang/Object;)I
  m public,static toString (Ljava/lang/Object;)Ljava/lang/String;
  m public,static isNull (Ljava/lang/Object;)Z
  m public,static requireNonNull (Ljava/lang/Object;)Ljava/lang/Object;
  m public,static requireNonNull (Ljava/lang/Object;Ljava/lang/String;)Ljava/lang/Object;
  m public,static,varargs hash ([Ljava/lang/Object;)I

class public java/util/Collections java/lang/Object
  m public,static emptyList ()Ljava/util/List;
  m public,static sort (Ljava/util/List;)V
  m public,static reverse (Ljava/util/List;)V
  m public,static unmodifiableList (Ljava/util/List;)Ljava/util/List;
"#;

static BOOTSTRAP: Lazy<HashMap<String, BinaryClass>> = Lazy::new(|| match parse_table(TABLE) {
    Ok(classes) => classes,
    Err(message) => {
        log::error!("bootstrap signature table is malformed: {}", message);
        HashMap::new()
    }
});

/// Bootstrap class by internal name
pub fn lookup(internal_name: &str) -> Option<&'static BinaryClass> {
    BOOTSTRAP.get(internal_name)
}

/// Internal names of every bootstrap class
pub fn class_names() -> impl Iterator<Item = &'static str> {
    BOOTSTRAP.keys().map(String::as_str)
}

fn parse_flags(text: &str) -> std::result::Result<u16, String> {
    let mut flags = 0;
    for flag in text.split(',') {
        flags |= match flag {
            "-" => 0,
            "public" => ACC_PUBLIC,
            "protected" => ACC_PROTECTED,
            "private" => ACC_PRIVATE,
            "static" => ACC_STATIC,
            "final" => ACC_FINAL,
            "abstract" => ACC_ABSTRACT,
            "native" => ACC_NATIVE,
            "synchronized" => ACC_SYNCHRONIZED,
            "varargs" => ACC_VARARGS,
            "interface" => ACC_INTERFACE | ACC_ABSTRACT,
            other => return Err(format!("unknown flag '{}'", other)),
        };
    }
    Ok(flags)
}

fn parse_constant(descriptor: &str, text: &str) -> std::result::Result<ConstValue, String> {
    let ty = parse_field_descriptor(descriptor).map_err(|e| e.to_string())?;
    let bad = |_| format!("bad constant '{}' for {}", text, descriptor);
    Ok(match ty {
        DescType::Primitive(PrimitiveType::Long) => ConstValue::Long(text.parse().map_err(bad)?),
        DescType::Primitive(PrimitiveType::Float) => {
            ConstValue::Float(text.parse().map_err(|_| format!("bad float '{}'", text))?)
        }
        DescType::Primitive(PrimitiveType::Double) => {
            ConstValue::Double(text.parse().map_err(|_| format!("bad double '{}'", text))?)
        }
        DescType::Primitive(_) => ConstValue::Int(text.parse().map_err(|_| format!("bad int '{}'", text))?),
        DescType::Class(ref name) if name == "java/lang/String" => ConstValue::String(text.to_string()),
        _ => return Err(format!("no constants of type {}", descriptor)),
    })
}

fn parse_table(text: &str) -> std::result::Result<HashMap<String, BinaryClass>, String> {
    let mut classes: HashMap<String, BinaryClass> = HashMap::new();
    let mut current: Option<BinaryClass> = None;

    for (number, line) in text.lines().enumerate() {
        let words: Vec<&str> = line.split_whitespace().collect();
        let context = |message: String| format!("line {}: {}", number + 1, message);
        match words.as_slice() {
            [] => continue,
            ["class", flags, name, super_name, rest @ ..] => {
                if let Some(done) = current.take() {
                    classes.insert(done.name.clone(), done);
                }
                let interfaces = match rest {
                    [] => Vec::new(),
                    [list] => list.split(',').map(str::to_string).collect(),
                    _ => return Err(context("too many words in class line".into())),
                };
                current = Some(BinaryClass {
                    name: name.to_string(),
                    access: parse_flags(flags).map_err(context)? | ACC_SUPER,
                    super_name: (*super_name != "-").then(|| super_name.to_string()),
                    interfaces,
                    fields: Vec::new(),
                    methods: Vec::new(),
                    inner_classes: Vec::new(),
                });
            }
            ["m", flags, name, descriptor, rest @ ..] => {
                let class = current.as_mut().ok_or_else(|| context("method outside class".into()))?;
                let exceptions = match rest {
                    [] => Vec::new(),
                    ["throws", list] => list.split(',').map(str::to_string).collect(),
                    _ => return Err(context("expected 'throws <list>'".into())),
                };
                class.methods.push(BinaryMethod {
                    name: name.to_string(),
                    descriptor: descriptor.to_string(),
                    access: parse_flags(flags).map_err(context)?,
                    exceptions,
                });
            }
            ["f", flags, name, descriptor, rest @ ..] => {
                let class = current.as_mut().ok_or_else(|| context("field outside class".into()))?;
                let constant = match rest {
                    [] => None,
                    ["=", value] => Some(parse_constant(descriptor, value).map_err(context)?),
                    _ => return Err(context("expected '= <value>'".into())),
                };
                class.fields.push(BinaryField {
                    name: name.to_string(),
                    descriptor: descriptor.to_string(),
                    access: parse_flags(flags).map_err(context)?,
                    constant,
                });
            }
            ["inner", inner, outer, simple, flags] => {
                let class = current.as_mut().ok_or_else(|| context("inner outside class".into()))?;
                class.inner_classes.push(InnerClassEntry {
                    inner: inner.to_string(),
                    outer: Some(outer.to_string()),
                    simple_name: Some(simple.to_string()),
                    access: parse_flags(flags).map_err(context)?,
                });
            }
            _ => return Err(context(format!("cannot parse '{}'", line.trim()))),
        }
    }
    if let Some(done) = current.take() {
        classes.insert(done.name.clone(), done);
    }
    Ok(classes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::descriptor::parse_method_descriptor;

    #[test]
    fn table_parses_completely() {
        let classes = parse_table(TABLE).expect("bootstrap table");
        assert_eq!(classes.len(), BOOTSTRAP.len());
        assert!(classes.contains_key("java/lang/Object"));
        assert!(classes.contains_key("java/util/Map$Entry"));
    }

    #[test]
    fn every_descriptor_is_well_formed() {
        for class in BOOTSTRAP.values() {
            for m in &class.methods {
                assert!(parse_method_descriptor(&m.descriptor).is_ok(), "{}.{}", class.name, m.name);
            }
            for f in &class.fields {
                assert!(parse_field_descriptor(&f.descriptor).is_ok(), "{}.{}", class.name, f.name);
            }
        }
    }

    #[test]
    fn every_referenced_supertype_is_present() {
        for class in BOOTSTRAP.values() {
            for parent in class.super_name.iter().chain(class.interfaces.iter()) {
                assert!(lookup(parent).is_some(), "{} extends missing {}", class.name, parent);
            }
        }
    }

    #[test]
    fn constants_are_typed_by_descriptor() {
        let integer = lookup("java/lang/Integer").unwrap();
        let max = integer.fields.iter().find(|f| f.name == "MAX_VALUE").unwrap();
        assert_eq!(max.constant, Some(ConstValue::Int(i32::MAX)));
        let double = lookup("java/lang/Double").unwrap();
        let inf = double.fields.iter().find(|f| f.name == "POSITIVE_INFINITY").unwrap();
        assert_eq!(inf.constant, Some(ConstValue::Double(f64::INFINITY)));
    }

    #[test]
    fn unknown_flags_are_rejected() {
        assert!(parse_table("class publik a/B -").is_err());
    }
}
